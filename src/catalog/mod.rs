//! Table catalog: resolves a table id to the page store that backs it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{QuarryError, Result, TableId};
use crate::storage::disk::PageStore;

/// Lookup interface the buffer pool uses to find a table's page store.
pub trait Catalog: Send + Sync {
    fn page_store(&self, table_id: TableId) -> Result<Arc<dyn PageStore>>;
}

/// In-memory catalog keyed by table id.
#[derive(Default)]
pub struct MemoryCatalog {
    tables: RwLock<HashMap<TableId, Arc<dyn PageStore>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a store under its own table id, replacing any previous one.
    pub fn add_table(&self, store: Arc<dyn PageStore>) {
        self.tables.write().insert(store.table_id(), store);
    }

    pub fn remove_table(&self, table_id: TableId) -> Option<Arc<dyn PageStore>> {
        self.tables.write().remove(&table_id)
    }

    /// Registered table ids in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.tables.read().keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Catalog for MemoryCatalog {
    fn page_store(&self, table_id: TableId) -> Result<Arc<dyn PageStore>> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(QuarryError::TableNotFound(table_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::HeapFile;
    use tempfile::tempdir;

    #[test]
    fn test_memory_catalog_lookup() {
        let dir = tempdir().unwrap();
        let catalog = MemoryCatalog::new();
        let store = HeapFile::open(dir.path().join("t1.tbl"), TableId::new(1)).unwrap();
        catalog.add_table(Arc::new(store));

        assert_eq!(catalog.table_ids(), vec![TableId::new(1)]);
        assert_eq!(
            catalog.page_store(TableId::new(1)).unwrap().table_id(),
            TableId::new(1)
        );
        assert!(matches!(
            catalog.page_store(TableId::new(2)),
            Err(QuarryError::TableNotFound(_))
        ));

        assert!(catalog.remove_table(TableId::new(1)).is_some());
        assert!(catalog.table_ids().is_empty());
    }
}

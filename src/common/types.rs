use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Table identifier - names the page store that backs a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl TableId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

/// Page identifier - a page number within one table's page store.
///
/// Compared structurally, so two separately constructed ids for the same
/// (table, page number) pair address the same lock and the same cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }

    /// Byte offset of this page within its backing file.
    pub fn offset(&self, page_size: usize) -> u64 {
        self.page_no as u64 * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageId({}:{})", self.table_id.0, self.page_no)
    }
}

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction identifier. Ids handed out by [`TransactionId::next`] are
/// never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh transaction id.
    pub fn next() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txn({})", self.0)
    }
}

/// Slot identifier within a heap page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u16);

impl SlotId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

/// Record identifier - the page and slot a row lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot_id.0)
    }
}

/// Lock modes a transaction can request on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockMode {
    /// Read access; any number of transactions may share it
    #[default]
    Shared,
    /// Write access; held by exactly one transaction
    Exclusive,
}

impl LockMode {
    /// Returns true if holding `self` is enough to satisfy a request for `requested`.
    pub fn covers(self, requested: LockMode) -> bool {
        match (self, requested) {
            (LockMode::Exclusive, _) => true,
            (LockMode::Shared, LockMode::Shared) => true,
            (LockMode::Shared, LockMode::Exclusive) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_structural_equality() {
        let a = PageId::new(TableId::new(3), 7);
        let b = PageId::new(TableId::new(3), 7);
        assert_eq!(a, b);
        assert_ne!(a, PageId::new(TableId::new(4), 7));
        assert_eq!(a.offset(4096), 7 * 4096);
    }

    #[test]
    fn test_transaction_ids_are_unique() {
        let a = TransactionId::next();
        let b = TransactionId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_lock_mode_covers() {
        assert!(LockMode::Exclusive.covers(LockMode::Shared));
        assert!(LockMode::Exclusive.covers(LockMode::Exclusive));
        assert!(LockMode::Shared.covers(LockMode::Shared));
        assert!(!LockMode::Shared.covers(LockMode::Exclusive));
    }
}

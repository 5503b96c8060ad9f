mod heap_file;
mod heap_scan;

pub use heap_file::*;
pub use heap_scan::*;

use crate::buffer::BufferPool;
use crate::common::{PageId, RecordId, Result, TableId, TransactionId};
use crate::storage::page::{Page, PageRef};

/// Persistent home of one table's pages.
///
/// Reads and writes are raw page I/O. Row mutations take the buffer pool
/// they must go through, lock and cache every page they touch via
/// [`BufferPool::fetch`], and return the pages they dirtied.
pub trait PageStore: Send + Sync {
    fn table_id(&self) -> TableId;

    fn read_page(&self, page_id: PageId) -> Result<Page>;

    /// Writes the page at its offset, extending the medium if needed.
    fn write_page(&self, page: &Page) -> Result<()>;

    fn num_pages(&self) -> Result<u32>;

    /// Places `row` in the first page with room, appending a page if none
    /// has any.
    fn insert_row(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        row: &[u8],
    ) -> Result<(RecordId, Vec<PageRef>)>;

    fn delete_row(&self, pool: &BufferPool, tid: TransactionId, rid: RecordId)
        -> Result<Vec<PageRef>>;
}

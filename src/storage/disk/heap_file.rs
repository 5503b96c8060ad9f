use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::buffer::BufferPool;
use crate::common::{
    LockMode, PageId, QuarryError, RecordId, Result, TableId, TransactionId, PAGE_SIZE,
};
use crate::storage::page::{Page, PageRef, MAX_ROW_SIZE};

use super::{HeapScan, PageStore};

/// HeapFile stores one table's rows, in no particular order, in a file of
/// fixed-size pages. Page `n` lives at byte offset `n * PAGE_SIZE` and the
/// page count is derived from the file length.
///
/// Row mutations go through the buffer pool so that every page they touch is
/// locked and cached like any other page access.
pub struct HeapFile {
    table_id: TableId,
    /// The backing file
    file: Mutex<File>,
    path: PathBuf,
    /// Serializes page allocation so two inserters never claim the same page number
    alloc: Mutex<()>,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl HeapFile {
    /// Opens the heap file at `path` for `table_id`, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P, table_id: TableId) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Ok(Self {
            table_id,
            file: Mutex::new(file),
            path: path.as_ref().to_path_buf(),
            alloc: Mutex::new(()),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Flushes written pages to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    /// Opens a scan over every row of the table on behalf of `tid`.
    pub fn scan<'a>(&'a self, pool: &'a BufferPool, tid: TransactionId) -> HeapScan<'a> {
        HeapScan::new(self, pool, tid)
    }

    fn check_owned(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id != self.table_id {
            return Err(QuarryError::InvalidPageReference {
                page_id,
                table_id: self.table_id,
            });
        }
        Ok(())
    }

    fn check_exists(&self, page_id: PageId) -> Result<()> {
        self.check_owned(page_id)?;
        if page_id.page_no >= self.num_pages()? {
            return Err(QuarryError::InvalidPageReference {
                page_id,
                table_id: self.table_id,
            });
        }
        Ok(())
    }

    /// Appends an empty page and writes it through so it exists on disk
    /// before anyone locks it.
    fn allocate_page(&self) -> Result<PageId> {
        let _alloc = self.alloc.lock();
        let page_id = PageId::new(self.table_id, self.num_pages()?);
        self.write_page(&Page::empty(page_id))?;
        trace!(%page_id, "allocated page");
        Ok(page_id)
    }

    /// Inserts into a page the caller has already locked exclusively.
    fn insert_into(page: &PageRef, tid: TransactionId, row: &[u8]) -> Result<Option<RecordId>> {
        let mut guard = page.write();
        if !guard.has_room_for(row.len()) {
            return Ok(None);
        }
        guard.mark_dirty(Some(tid));
        guard.insert_row(row).map(Some)
    }
}

impl PageStore for HeapFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        self.check_exists(page_id)?;

        let mut data = Box::new([0u8; PAGE_SIZE]);
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
            file.read_exact(&mut data[..])?;
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(Page::new(page_id, data))
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let page_id = page.id();
        self.check_owned(page_id)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
        file.write_all(page.data())?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn num_pages(&self) -> Result<u32> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / PAGE_SIZE as u64) as u32)
    }

    fn insert_row(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        row: &[u8],
    ) -> Result<(RecordId, Vec<PageRef>)> {
        if row.len() > MAX_ROW_SIZE {
            return Err(QuarryError::RowTooLarge {
                row_size: row.len(),
                capacity: MAX_ROW_SIZE,
            });
        }

        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_no);
            let page = pool.fetch(tid, page_id, LockMode::Exclusive)?;
            if let Some(rid) = Self::insert_into(&page, tid, row)? {
                return Ok((rid, vec![page]));
            }
        }

        // Every page is full. A page we just appended can still be filled by
        // another transaction before we lock it, so keep appending until one
        // takes the row.
        loop {
            let page_id = self.allocate_page()?;
            let page = pool.fetch(tid, page_id, LockMode::Exclusive)?;
            if let Some(rid) = Self::insert_into(&page, tid, row)? {
                return Ok((rid, vec![page]));
            }
        }
    }

    fn delete_row(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        rid: RecordId,
    ) -> Result<Vec<PageRef>> {
        self.check_exists(rid.page_id)?;

        let page = pool.fetch(tid, rid.page_id, LockMode::Exclusive)?;
        {
            let mut guard = page.write();
            guard.row(rid.slot_id)?;
            guard.mark_dirty(Some(tid));
            guard.delete_row(rid.slot_id)?;
        }
        Ok(vec![page])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn table() -> TableId {
        TableId::new(1)
    }

    #[test]
    fn test_heap_file_new_is_empty() {
        let temp_file = NamedTempFile::new().unwrap();
        let hf = HeapFile::open(temp_file.path(), table()).unwrap();
        assert_eq!(hf.num_pages().unwrap(), 0);
        assert_eq!(hf.table_id(), table());
    }

    #[test]
    fn test_heap_file_write_extends_and_reads_back() {
        let temp_file = NamedTempFile::new().unwrap();
        let hf = HeapFile::open(temp_file.path(), table()).unwrap();

        let mut page = Page::empty(PageId::new(table(), 2));
        page.insert_row(b"on page two").unwrap();
        hf.write_page(&page).unwrap();

        // Writing page 2 extends the file over pages 0 and 1 as well
        assert_eq!(hf.num_pages().unwrap(), 3);

        let read = hf.read_page(PageId::new(table(), 2)).unwrap();
        assert_eq!(read.row_count(), 1);
        assert!(!read.is_dirty());
        assert_eq!(hf.read_page(PageId::new(table(), 0)).unwrap().row_count(), 0);
        assert_eq!(hf.num_writes(), 1);
        assert_eq!(hf.num_reads(), 2);
    }

    #[test]
    fn test_heap_file_rejects_foreign_pages() {
        let temp_file = NamedTempFile::new().unwrap();
        let hf = HeapFile::open(temp_file.path(), table()).unwrap();

        let foreign = Page::empty(PageId::new(TableId::new(2), 0));
        assert!(matches!(
            hf.write_page(&foreign),
            Err(QuarryError::InvalidPageReference { .. })
        ));
        assert!(matches!(
            hf.read_page(PageId::new(table(), 0)),
            Err(QuarryError::InvalidPageReference { .. })
        ));
    }

    #[test]
    fn test_heap_file_persistence() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let hf = HeapFile::open(&path, table()).unwrap();
            let mut page = Page::empty(PageId::new(table(), 0));
            page.insert_row(b"durable").unwrap();
            hf.write_page(&page).unwrap();
            hf.sync().unwrap();
        }

        let hf = HeapFile::open(&path, table()).unwrap();
        assert_eq!(hf.num_pages().unwrap(), 1);
        let page = hf.read_page(PageId::new(table(), 0)).unwrap();
        let rows: Vec<_> = page.rows().map(|(_, r)| r.to_vec()).collect();
        assert_eq!(rows, vec![b"durable".to_vec()]);
    }
}

use std::collections::VecDeque;

use bytes::Bytes;

use crate::buffer::BufferPool;
use crate::common::{LockMode, PageId, RecordId, Result, TransactionId};

use super::{HeapFile, PageStore};

/// A row produced by a scan: where it lives and a copy of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub rid: RecordId,
    pub data: Bytes,
}

/// Lazy scan over a heap file, page by page in page-number order and slot
/// order within a page.
///
/// Each page is fetched with a shared lock when the scan reaches it, and
/// the page's rows are copied out so no page latch outlives a call to
/// `next`. Under strict 2PL the locks stay held until the transaction ends,
/// so a rewound scan of an unchanged table yields the same rows again.
pub struct HeapScan<'a> {
    store: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    next_page: u32,
    pending: VecDeque<Row>,
    open: bool,
}

impl<'a> HeapScan<'a> {
    pub(crate) fn new(store: &'a HeapFile, pool: &'a BufferPool, tid: TransactionId) -> Self {
        Self {
            store,
            pool,
            tid,
            next_page: 0,
            pending: VecDeque::new(),
            open: true,
        }
    }

    /// Restarts the scan at page 0.
    pub fn open(&mut self) {
        self.next_page = 0;
        self.pending.clear();
        self.open = true;
    }

    pub fn rewind(&mut self) {
        self.close();
        self.open();
    }

    /// Stops the scan; `next` returns `None` until it is reopened.
    pub fn close(&mut self) {
        self.pending.clear();
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn load_next_page(&mut self) -> Result<bool> {
        if self.next_page >= self.store.num_pages()? {
            return Ok(false);
        }

        let page_id = PageId::new(self.store.table_id(), self.next_page);
        let page = self.pool.fetch(self.tid, page_id, LockMode::Shared)?;
        let guard = page.read();
        self.pending.extend(guard.rows().map(|(rid, bytes)| Row {
            rid,
            data: Bytes::copy_from_slice(bytes),
        }));
        self.next_page += 1;
        Ok(true)
    }
}

impl Iterator for HeapScan<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.open {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            match self.load_next_page() {
                Ok(true) => continue,
                Ok(false) => {
                    self.close();
                    return None;
                }
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

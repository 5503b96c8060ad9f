use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::catalog::Catalog;
use crate::common::{LockMode, PageId, QuarryError, RecordId, Result, TableId, TransactionId};
use crate::concurrency::LockManager;
use crate::storage::log::LogSink;
use crate::storage::page::{Page, PageRef};

use super::LruList;

/// Cached pages and their recency order, guarded together so that admission,
/// eviction and discard see one consistent view of the capacity.
struct PageCache {
    pages: HashMap<PageId, PageRef>,
    lru: LruList,
}

/// BufferPool caches up to `capacity` pages and is the only way pages are
/// accessed. Every fetch first takes a page lock through the
/// [`LockManager`], so locking is strict two-phase: locks are released only
/// when the transaction commits or aborts.
///
/// Replacement is LRU under a no-steal policy: a page dirtied by a running
/// transaction is never evicted, nor is a page whose [`PageRef`] a caller
/// still holds. A cache holding nothing but such pages refuses new pages
/// with [`QuarryError::BufferPoolExhausted`].
pub struct BufferPool {
    /// Maximum number of cached pages
    capacity: usize,
    lock_manager: LockManager,
    catalog: Arc<dyn Catalog>,
    log: Arc<dyn LogSink>,
    cache: Mutex<PageCache>,
}

impl BufferPool {
    /// Creates a buffer pool that caches up to `capacity` pages, resolving
    /// page stores through `catalog` and logging commits to `log`.
    pub fn new(capacity: usize, catalog: Arc<dyn Catalog>, log: Arc<dyn LogSink>) -> Self {
        Self {
            capacity,
            lock_manager: LockManager::new(),
            catalog,
            log,
            cache: Mutex::new(PageCache {
                pages: HashMap::with_capacity(capacity),
                lru: LruList::with_capacity(capacity),
            }),
        }
    }

    /// Returns the page with `mode` locked for `tid`.
    ///
    /// Blocks while another transaction holds a conflicting lock. Fails with
    /// [`QuarryError::Deadlock`] before touching the cache if waiting would
    /// deadlock; the caller must then abort `tid`.
    pub fn fetch(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<PageRef> {
        self.lock_manager.acquire(tid, page_id, mode)?;

        let mut cache = self.cache.lock();
        if let Some(page) = cache.pages.get(&page_id).cloned() {
            cache.lru.touch(page_id);
            return Ok(page);
        }

        // Read under the cache lock so two fetches of the same page never
        // both admit it.
        let store = self.catalog.page_store(page_id.table_id)?;
        let page = store.read_page(page_id)?.into_ref();
        self.admit(&mut cache, page_id, Arc::clone(&page))?;
        Ok(page)
    }

    /// Inserts `row` into `table_id` on behalf of `tid` and returns where it landed.
    pub fn insert_row(&self, tid: TransactionId, table_id: TableId, row: &[u8]) -> Result<RecordId> {
        let store = self.catalog.page_store(table_id)?;
        let (rid, dirtied) = store.insert_row(self, tid, row)?;
        self.track_dirtied(tid, dirtied)?;
        Ok(rid)
    }

    /// Deletes the row at `rid` on behalf of `tid`.
    pub fn delete_row(&self, tid: TransactionId, rid: RecordId) -> Result<()> {
        let store = self.catalog.page_store(rid.page_id.table_id)?;
        let dirtied = store.delete_row(self, tid, rid)?;
        self.track_dirtied(tid, dirtied)
    }

    /// Commits `tid`: logs and writes back every page it dirtied, then
    /// releases all of its locks.
    ///
    /// Every dirty page is attempted even after a failure. Pages written
    /// before or after a failed one stay durable; the failed ones are
    /// dropped from the cache and listed in
    /// [`QuarryError::CommitIncomplete`]. Locks are released either way.
    pub fn commit(&self, tid: TransactionId) -> Result<()> {
        let mut failed = Vec::new();
        let mut first_error = None;

        for page_id in self.lock_manager.held_pages(tid) {
            if let Err(e) = self.flush_committed(tid, page_id) {
                warn!(%tid, %page_id, error = %e, "failed to write back page at commit");
                self.discard(page_id);
                failed.push(page_id);
                first_error.get_or_insert(e);
            }
        }
        self.lock_manager.release_all(tid);

        match first_error {
            None => {
                debug!(%tid, "transaction committed");
                Ok(())
            }
            Some(source) => Err(QuarryError::CommitIncomplete {
                tid,
                failed,
                source: Box::new(source),
            }),
        }
    }

    /// Aborts `tid`: drops every page it locked from the cache, so later
    /// fetches re-read the on-disk version, then releases its locks.
    pub fn abort(&self, tid: TransactionId) {
        for page_id in self.lock_manager.held_pages(tid) {
            self.discard(page_id);
        }
        self.lock_manager.release_all(tid);
        debug!(%tid, "transaction aborted");
    }

    /// Commits or aborts `tid`.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        if commit {
            self.commit(tid)
        } else {
            self.abort(tid);
            Ok(())
        }
    }

    /// Writes every dirty cached page back to its store.
    ///
    /// Meant for checkpoints and shutdown. It bypasses transaction
    /// bookkeeping and breaks no-steal if transactions are still running.
    pub fn flush_all(&self) -> Result<()> {
        let pages: Vec<PageRef> = self.cache.lock().pages.values().cloned().collect();
        for page in pages {
            self.flush(&page)?;
        }
        Ok(())
    }

    /// Writes one cached page back if it is dirty. Same caveats as [`flush_all`](Self::flush_all).
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        match self.cached(page_id) {
            Some(page) => self.flush(&page),
            None => Ok(()),
        }
    }

    /// Writes back the pages `tid` has dirtied without ending it.
    /// Same caveats as [`flush_all`](Self::flush_all).
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for page_id in self.lock_manager.held_pages(tid) {
            if let Some(page) = self.cached(page_id) {
                if page.read().dirtier() == Some(tid) {
                    self.flush(&page)?;
                }
            }
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it back.
    pub fn discard(&self, page_id: PageId) {
        let mut cache = self.cache.lock();
        if cache.pages.remove(&page_id).is_some() {
            cache.lru.remove(page_id);
            trace!(%page_id, "discarded page");
        }
    }

    /// Releases one page lock before the transaction ends.
    ///
    /// This gives up two-phase locking for that page; only callers that
    /// never read or wrote through the lock should use it.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release(tid, page_id);
    }

    /// Returns true if `tid` holds any lock on `page_id`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds(tid, page_id, LockMode::Shared)
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.cache.lock().pages.contains_key(&page_id)
    }

    /// Number of cached pages.
    pub fn len(&self) -> usize {
        self.cache.lock().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    fn cached(&self, page_id: PageId) -> Option<PageRef> {
        self.cache.lock().pages.get(&page_id).cloned()
    }

    /// Marks pages a row operation touched as dirtied by `tid` and makes sure
    /// each is cached as the most recently used page. A page can have been
    /// evicted between its fetch and its mutation, so it may need readmitting.
    fn track_dirtied(&self, tid: TransactionId, pages: Vec<PageRef>) -> Result<()> {
        for page in pages {
            let page_id = {
                let mut guard = page.write();
                guard.mark_dirty(Some(tid));
                guard.id()
            };

            let mut cache = self.cache.lock();
            if cache.pages.contains_key(&page_id) {
                cache.pages.insert(page_id, page);
                cache.lru.touch(page_id);
            } else {
                self.admit(&mut cache, page_id, page)?;
            }
        }
        Ok(())
    }

    fn admit(&self, cache: &mut PageCache, page_id: PageId, page: PageRef) -> Result<()> {
        if cache.pages.len() >= self.capacity {
            self.evict(cache)?;
        }
        cache.pages.insert(page_id, page);
        cache.lru.touch(page_id);
        Ok(())
    }

    /// Evicts the least recently used clean page that nobody outside the
    /// cache still references. A page whose handle is held elsewhere or
    /// whose latch is taken may be mutated at any moment and is pinned.
    fn evict(&self, cache: &mut PageCache) -> Result<()> {
        let victim = cache.lru.iter_lru().find(|page_id| {
            cache
                .pages
                .get(page_id)
                .filter(|page| Arc::strong_count(page) == 1)
                .and_then(|page| page.try_read())
                .is_some_and(|page| !page.is_dirty())
        });

        match victim {
            Some(page_id) => {
                cache.pages.remove(&page_id);
                cache.lru.remove(page_id);
                trace!(%page_id, "evicted page");
                Ok(())
            }
            None => Err(QuarryError::BufferPoolExhausted {
                capacity: self.capacity,
            }),
        }
    }

    /// Logs and writes back one page if dirty, then marks it clean.
    fn flush(&self, page: &PageRef) -> Result<()> {
        let mut guard = page.write();
        if guard.is_dirty() {
            self.write_back(&guard)?;
            guard.mark_dirty(None);
        }
        Ok(())
    }

    /// Commit-time write back: only pages `tid` dirtied, and the written
    /// content becomes the next before-image.
    fn flush_committed(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        // Pinned pages are never evicted, so an uncached page here was
        // evicted clean and has nothing of tid's to write.
        let Some(page) = self.cached(page_id) else {
            trace!(%tid, %page_id, "held page not cached at commit");
            return Ok(());
        };
        let mut guard = page.write();
        if guard.dirtier() == Some(tid) {
            self.write_back(&guard)?;
            guard.set_before_image();
            guard.mark_dirty(None);
        }
        Ok(())
    }

    /// Appends the update record, forces the log, then writes the page.
    fn write_back(&self, page: &Page) -> Result<()> {
        if let Some(dirtier) = page.dirtier() {
            self.log.log_write(dirtier, &page.before_image(), page)?;
            self.log.force()?;
        }
        let store = self.catalog.page_store(page.id().table_id)?;
        store.write_page(page)
    }
}

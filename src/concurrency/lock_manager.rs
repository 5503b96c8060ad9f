use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::common::{LockMode, PageId, QuarryError, Result, TransactionId};

use super::WaitForGraph;

/// Lock state of a single page.
///
/// Shared mode admits any number of holders, exclusive mode exactly one.
/// With no holders the mode is meaningless and is reset to the default.
#[derive(Debug, Default)]
struct LockState {
    mode: LockMode,
    holders: HashSet<TransactionId>,
}

impl LockState {
    /// Returns true if `tid` already holds enough to satisfy `mode`.
    fn satisfies(&self, tid: TransactionId, mode: LockMode) -> bool {
        self.holders.contains(&tid) && self.mode.covers(mode)
    }

    fn sole_holder(&self, tid: TransactionId) -> bool {
        self.holders.len() == 1 && self.holders.contains(&tid)
    }

    /// Grants `mode` to `tid` if compatible with the current holders.
    fn try_grant(&mut self, tid: TransactionId, mode: LockMode) -> bool {
        if self.satisfies(tid, mode) {
            return true;
        }
        let grantable = match mode {
            LockMode::Shared => self.holders.is_empty() || self.mode == LockMode::Shared,
            LockMode::Exclusive => self.holders.is_empty() || self.sole_holder(tid),
        };
        if grantable {
            // An exclusive holder re-requesting shared is caught by satisfies();
            // here the mode only ever stays or strengthens.
            if self.holders.is_empty() || mode == LockMode::Exclusive {
                self.mode = mode;
            }
            self.holders.insert(tid);
        }
        grantable
    }

    /// Holders that block `tid` from getting `mode`.
    fn blockers(&self, tid: TransactionId) -> impl Iterator<Item = TransactionId> + '_ {
        self.holders.iter().copied().filter(move |&h| h != tid)
    }

    fn release(&mut self, tid: TransactionId) -> bool {
        let removed = self.holders.remove(&tid);
        if self.holders.is_empty() {
            self.mode = LockMode::default();
        }
        removed
    }
}

/// A page lock plus the condition its waiters sleep on.
#[derive(Debug, Default)]
struct PageLock {
    state: Mutex<LockState>,
    released: Condvar,
}

/// Page-level strict two-phase lock manager with wait-for-graph deadlock
/// detection.
///
/// A blocked request registers edges to the current holders and checks for
/// a cycle before it sleeps; a cycle fails the request immediately with
/// [`QuarryError::Deadlock`]. There is no timeout. Waiters are woken on
/// every release of the page and re-evaluate in no particular order.
///
/// Lock ordering: a page's state mutex may be held while taking the graph
/// or the held-page table, never the other way around.
#[derive(Debug, Default)]
pub struct LockManager {
    /// Page locks, created lazily and never removed
    table: Mutex<HashMap<PageId, Arc<PageLock>>>,
    /// Pages each transaction holds a lock on
    held: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
    /// Global wait-for graph; mutation and cycle search happen under one lock
    graph: Mutex<WaitForGraph>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn page_lock(&self, page_id: PageId) -> Arc<PageLock> {
        Arc::clone(self.table.lock().entry(page_id).or_default())
    }

    fn existing_page_lock(&self, page_id: PageId) -> Option<Arc<PageLock>> {
        self.table.lock().get(&page_id).cloned()
    }

    /// Acquires `mode` on `page_id` for `tid`, blocking while other
    /// transactions hold conflicting locks.
    ///
    /// Returns [`QuarryError::Deadlock`] if waiting would close a cycle in
    /// the wait-for graph. The lock is not granted in that case and locks
    /// `tid` already holds are left alone: the caller aborts.
    pub fn acquire(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let lock = self.page_lock(page_id);
        let mut state = lock.state.lock();

        loop {
            if state.try_grant(tid, mode) {
                self.held.lock().entry(tid).or_default().insert(page_id);
                self.graph.lock().clear_waits(tid);
                trace!(%tid, %page_id, ?mode, "lock granted");
                return Ok(());
            }

            let acyclic = self.graph.lock().set_waits(tid, state.blockers(tid));
            if !acyclic {
                debug!(%tid, %page_id, ?mode, "deadlock detected");
                return Err(QuarryError::Deadlock { tid, page_id });
            }

            trace!(%tid, %page_id, ?mode, "waiting for lock");
            lock.released.wait(&mut state);
        }
    }

    /// Releases `tid`'s lock on `page_id`, waking the page's waiters.
    pub fn release(&self, tid: TransactionId, page_id: PageId) {
        if let Some(lock) = self.existing_page_lock(page_id) {
            let released = lock.state.lock().release(tid);
            if released {
                lock.released.notify_all();
            }
        }
        let mut held = self.held.lock();
        if let Some(pages) = held.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                held.remove(&tid);
            }
        }
    }

    /// Releases every lock `tid` holds and drops it from the wait-for graph.
    pub fn release_all(&self, tid: TransactionId) {
        let pages = self.held.lock().remove(&tid).unwrap_or_default();
        for page_id in &pages {
            if let Some(lock) = self.existing_page_lock(*page_id) {
                lock.state.lock().release(tid);
                lock.released.notify_all();
            }
        }
        self.graph.lock().remove_txn(tid);
        trace!(%tid, count = pages.len(), "released all locks");
    }

    /// Returns true if `tid`'s current lock on `page_id` satisfies `mode`.
    /// Never blocks on other transactions.
    pub fn holds(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        self.existing_page_lock(page_id)
            .map(|lock| lock.state.lock().satisfies(tid, mode))
            .unwrap_or(false)
    }

    /// Current mode and holders of `page_id`, or `None` if nobody holds it.
    pub fn lock_info(&self, page_id: PageId) -> Option<(LockMode, Vec<TransactionId>)> {
        let lock = self.existing_page_lock(page_id)?;
        let state = lock.state.lock();
        if state.holders.is_empty() {
            return None;
        }
        let mut holders: Vec<_> = state.holders.iter().copied().collect();
        holders.sort();
        Some((state.mode, holders))
    }

    /// Pages `tid` holds a lock on, in page order.
    pub fn held_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<_> = self
            .held
            .lock()
            .get(&tid)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Transactions `tid` is currently blocked on.
    pub fn waiting_on(&self, tid: TransactionId) -> Vec<TransactionId> {
        self.graph.lock().waits_of(tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;

    fn pid(n: u32) -> PageId {
        PageId::new(TableId::new(1), n)
    }

    fn t(id: u64) -> TransactionId {
        TransactionId::new(id)
    }

    #[test]
    fn test_lock_manager_shared_is_shared() {
        let lm = LockManager::new();
        lm.acquire(t(1), pid(0), LockMode::Shared).unwrap();
        lm.acquire(t(2), pid(0), LockMode::Shared).unwrap();

        assert!(lm.holds(t(1), pid(0), LockMode::Shared));
        assert!(lm.holds(t(2), pid(0), LockMode::Shared));
        assert!(!lm.holds(t(1), pid(0), LockMode::Exclusive));
        assert_eq!(
            lm.lock_info(pid(0)),
            Some((LockMode::Shared, vec![t(1), t(2)]))
        );
    }

    #[test]
    fn test_lock_manager_reentrant_requests() {
        let lm = LockManager::new();
        lm.acquire(t(1), pid(0), LockMode::Exclusive).unwrap();

        // Weaker and equal requests never block
        lm.acquire(t(1), pid(0), LockMode::Shared).unwrap();
        lm.acquire(t(1), pid(0), LockMode::Exclusive).unwrap();

        assert_eq!(lm.lock_info(pid(0)), Some((LockMode::Exclusive, vec![t(1)])));
        assert_eq!(lm.held_pages(t(1)), vec![pid(0)]);
    }

    #[test]
    fn test_lock_manager_upgrade_sole_holder() {
        let lm = LockManager::new();
        lm.acquire(t(1), pid(0), LockMode::Shared).unwrap();
        lm.acquire(t(1), pid(0), LockMode::Exclusive).unwrap();

        assert!(lm.holds(t(1), pid(0), LockMode::Exclusive));
        assert_eq!(lm.lock_info(pid(0)), Some((LockMode::Exclusive, vec![t(1)])));
    }

    #[test]
    fn test_lock_manager_release_resets_lock() {
        let lm = LockManager::new();
        lm.acquire(t(1), pid(0), LockMode::Exclusive).unwrap();
        lm.release(t(1), pid(0));

        assert!(!lm.holds(t(1), pid(0), LockMode::Shared));
        assert_eq!(lm.lock_info(pid(0)), None);
        assert!(lm.held_pages(t(1)).is_empty());

        // An unheld lock comes back in whatever mode is asked for
        lm.acquire(t(2), pid(0), LockMode::Shared).unwrap();
        assert_eq!(lm.lock_info(pid(0)), Some((LockMode::Shared, vec![t(2)])));
    }

    #[test]
    fn test_lock_manager_release_all() {
        let lm = LockManager::new();
        for n in 0..4 {
            lm.acquire(t(1), pid(n), LockMode::Exclusive).unwrap();
        }
        lm.acquire(t(2), pid(9), LockMode::Shared).unwrap();

        lm.release_all(t(1));

        for n in 0..4 {
            assert!(!lm.holds(t(1), pid(n), LockMode::Shared));
            assert_eq!(lm.lock_info(pid(n)), None);
        }
        assert!(lm.holds(t(2), pid(9), LockMode::Shared));
    }

    #[test]
    fn test_lock_manager_holds_unknown_page() {
        let lm = LockManager::new();
        assert!(!lm.holds(t(1), pid(42), LockMode::Shared));
        assert!(lm.waiting_on(t(1)).is_empty());
    }
}

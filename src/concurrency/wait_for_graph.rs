use std::collections::{HashMap, HashSet};

use crate::common::TransactionId;

/// Directed wait-for graph among transactions.
///
/// An edge `A -> B` means A is blocked on a lock B holds. The graph is kept
/// acyclic: an edge set that would close a cycle is rolled back and
/// reported, and the transaction that tried to add it is the one to abort.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the out-edges of `waiter` with `holders` (self-edges are
    /// dropped). Runs cycle detection when the edge set grew.
    ///
    /// Returns `false`, with `waiter`'s out-edges cleared, if the new edges
    /// would close a cycle.
    pub fn set_waits<I>(&mut self, waiter: TransactionId, holders: I) -> bool
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let new: HashSet<TransactionId> = holders.into_iter().filter(|&h| h != waiter).collect();
        let grew = match self.edges.get(&waiter) {
            Some(old) => !new.is_subset(old),
            None => !new.is_empty(),
        };

        if new.is_empty() {
            self.edges.remove(&waiter);
        } else {
            self.edges.insert(waiter, new);
        }

        if grew && self.reaches(waiter, waiter) {
            self.edges.remove(&waiter);
            return false;
        }
        true
    }

    /// Removes every out-edge of `waiter`.
    pub fn clear_waits(&mut self, waiter: TransactionId) {
        self.edges.remove(&waiter);
    }

    /// Removes `tid` from the graph entirely, both as waiter and as holder.
    pub fn remove_txn(&mut self, tid: TransactionId) {
        self.edges.remove(&tid);
        self.edges.retain(|_, holders| {
            holders.remove(&tid);
            !holders.is_empty()
        });
    }

    /// Transactions `waiter` is currently blocked on.
    pub fn waits_of(&self, waiter: TransactionId) -> Vec<TransactionId> {
        let mut holders: Vec<_> = self
            .edges
            .get(&waiter)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }

    /// Returns true if a path of one or more edges leads from `from` to `to`.
    ///
    /// Iterative depth-first search with an explicit stack.
    pub fn reaches(&self, from: TransactionId, to: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<TransactionId> = match self.edges.get(&from) {
            Some(next) => next.iter().copied().collect(),
            None => return false,
        };

        while let Some(tid) = stack.pop() {
            if tid == to {
                return true;
            }
            if !visited.insert(tid) {
                continue;
            }
            if let Some(next) = self.edges.get(&tid) {
                stack.extend(next.iter().copied().filter(|t| !visited.contains(t)));
            }
        }
        false
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

use std::collections::HashMap;

use crate::common::PageId;

/// Entry in the recency list, linked by arena index
#[derive(Debug, Clone, Copy)]
struct Node {
    page_id: PageId,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Recency ordering of cached pages.
///
/// A doubly linked list threaded through a preallocated arena: `head` is
/// the most recently used page, `tail` the least. The map gives O(1) access
/// to a page's node for touch and removal.
#[derive(Debug)]
pub struct LruList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    index: HashMap<PageId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruList {
    /// Creates an empty list with room for `capacity` pages before the
    /// arena has to grow.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Marks `page_id` as most recently used, inserting it if absent.
    pub fn touch(&mut self, page_id: PageId) {
        match self.index.get(&page_id) {
            Some(&idx) => {
                if self.head != Some(idx) {
                    self.unlink(idx);
                    self.push_front(idx);
                }
            }
            None => {
                let node = Node {
                    page_id,
                    prev: None,
                    next: None,
                };
                let idx = match self.free.pop() {
                    Some(idx) => {
                        self.nodes[idx] = node;
                        idx
                    }
                    None => {
                        self.nodes.push(node);
                        self.nodes.len() - 1
                    }
                };
                self.index.insert(page_id, idx);
                self.push_front(idx);
            }
        }
    }

    /// Removes `page_id`; returns false if it was not present.
    pub fn remove(&mut self, page_id: PageId) -> bool {
        match self.index.remove(&page_id) {
            Some(idx) => {
                self.unlink(idx);
                self.free.push(idx);
                true
            }
            None => false,
        }
    }

    /// Returns the most recently used page.
    pub fn front(&self) -> Option<PageId> {
        self.head.map(|idx| self.nodes[idx].page_id)
    }

    /// Pages from least to most recently used.
    pub fn iter_lru(&self) -> impl Iterator<Item = PageId> + '_ {
        let mut cursor = self.tail;
        std::iter::from_fn(move || {
            let idx = cursor?;
            let node = &self.nodes[idx];
            cursor = node.prev;
            Some(node.page_id)
        })
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        match self.head {
            Some(old) => self.nodes[old].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let Node { prev, next, .. } = self.nodes[idx];
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;

    fn pid(n: u32) -> PageId {
        PageId::new(TableId::new(1), n)
    }

    fn order(list: &LruList) -> Vec<u32> {
        list.iter_lru().map(|p| p.page_no).collect()
    }

    #[test]
    fn test_lru_list_insertion_order() {
        let mut list = LruList::with_capacity(4);
        for n in 0..4 {
            list.touch(pid(n));
        }
        assert_eq!(list.len(), 4);
        assert_eq!(order(&list), vec![0, 1, 2, 3]);
        assert_eq!(list.front(), Some(pid(3)));
    }

    #[test]
    fn test_lru_list_touch_moves_to_front() {
        let mut list = LruList::with_capacity(4);
        for n in 0..4 {
            list.touch(pid(n));
        }
        list.touch(pid(0));
        list.touch(pid(2));
        assert_eq!(order(&list), vec![1, 3, 0, 2]);

        // Touching the head is a no-op
        list.touch(pid(2));
        assert_eq!(order(&list), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_lru_list_remove_and_reuse() {
        let mut list = LruList::with_capacity(3);
        for n in 0..3 {
            list.touch(pid(n));
        }

        assert!(list.remove(pid(1)));
        assert!(!list.remove(pid(1)));
        assert_eq!(order(&list), vec![0, 2]);

        assert!(list.remove(pid(0)));
        assert!(list.remove(pid(2)));
        assert!(list.is_empty());
        assert_eq!(list.front(), None);

        // Freed arena slots are reused
        list.touch(pid(7));
        list.touch(pid(8));
        assert_eq!(order(&list), vec![7, 8]);
        assert_eq!(list.nodes.len(), 3);
    }
}

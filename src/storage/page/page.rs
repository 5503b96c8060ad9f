use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{PageId, RecordId, Result, SlotId, TransactionId, PAGE_SIZE};

use super::heap_page::{HeapPage, HeapPageRef};

/// Shared handle to a cached page. The buffer pool hands these out; the
/// lock manager, not the `RwLock`, decides which transactions may use them.
pub type PageRef = Arc<RwLock<Page>>;

/// An in-memory copy of one fixed-size page.
///
/// Besides the raw bytes, a page remembers which transaction dirtied it and
/// a before-image: the content as of the last time the page was clean. The
/// before-image is what commit hands to the log next to the current bytes.
#[derive(Clone)]
pub struct Page {
    id: PageId,
    data: Box<[u8; PAGE_SIZE]>,
    dirtier: Option<TransactionId>,
    before_image: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Creates a clean page whose before-image equals its content.
    pub fn new(id: PageId, data: Box<[u8; PAGE_SIZE]>) -> Self {
        let before_image = data.clone();
        Self {
            id,
            data,
            dirtier: None,
            before_image,
        }
    }

    /// Creates a clean, empty page.
    pub fn empty(id: PageId) -> Self {
        Self::new(id, Box::new([0u8; PAGE_SIZE]))
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Raw mutable access. Callers are expected to mark the page dirty first.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    /// Returns the transaction that dirtied this page, if any.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// Sets or clears the dirty owner. The clean to dirty transition
    /// snapshots the current content as the before-image.
    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        if self.dirtier.is_none() && dirtier.is_some() {
            self.before_image.copy_from_slice(&self.data[..]);
        }
        self.dirtier = dirtier;
    }

    /// Returns a clean page holding the before-image content.
    pub fn before_image(&self) -> Page {
        Page::new(self.id, self.before_image.clone())
    }

    /// Makes the current content the baseline for the next writer.
    pub fn set_before_image(&mut self) {
        self.before_image.copy_from_slice(&self.data[..]);
    }

    pub fn has_room_for(&self, row_size: usize) -> bool {
        HeapPageRef::new(self.data()).has_room_for(row_size)
    }

    pub fn row_count(&self) -> usize {
        HeapPageRef::new(self.data()).row_count()
    }

    pub fn row(&self, slot_id: SlotId) -> Result<&[u8]> {
        HeapPageRef::new(self.data()).row(slot_id)
    }

    /// Occupied rows in slot order, tagged with their record ids.
    pub fn rows(&self) -> impl Iterator<Item = (RecordId, &[u8])> + '_ {
        let id = self.id;
        HeapPageRef::new(self.data())
            .rows()
            .map(move |(slot_id, bytes)| (RecordId::new(id, slot_id), bytes))
    }

    pub fn insert_row(&mut self, bytes: &[u8]) -> Result<RecordId> {
        let slot_id = HeapPage::new(self.data_mut()).insert_row(bytes)?;
        Ok(RecordId::new(self.id, slot_id))
    }

    pub fn delete_row(&mut self, slot_id: SlotId) -> Result<()> {
        HeapPage::new(self.data_mut()).delete_row(slot_id)
    }

    /// Wraps the page in the shared handle the buffer pool caches.
    pub fn into_ref(self) -> PageRef {
        Arc::new(RwLock::new(self))
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("dirtier", &self.dirtier)
            .field("rows", &self.row_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;

    fn pid(n: u32) -> PageId {
        PageId::new(TableId::new(1), n)
    }

    #[test]
    fn test_page_new_is_clean() {
        let page = Page::empty(pid(0));
        assert_eq!(page.id(), pid(0));
        assert!(!page.is_dirty());
        assert_eq!(page.dirtier(), None);
        assert_eq!(page.row_count(), 0);
    }

    #[test]
    fn test_page_mark_dirty_captures_before_image() {
        let mut page = Page::empty(pid(0));
        let tid = TransactionId::new(7);

        page.mark_dirty(Some(tid));
        let rid = page.insert_row(b"row").unwrap();

        assert_eq!(page.dirtier(), Some(tid));
        assert_eq!(page.before_image().row_count(), 0);
        assert_eq!(page.row(rid.slot_id).unwrap(), b"row");

        // Staying dirty must not move the baseline
        page.mark_dirty(Some(tid));
        assert_eq!(page.before_image().row_count(), 0);
    }

    #[test]
    fn test_page_set_before_image_rebaselines() {
        let mut page = Page::empty(pid(3));
        page.mark_dirty(Some(TransactionId::new(1)));
        page.insert_row(b"committed").unwrap();

        page.set_before_image();
        page.mark_dirty(None);

        let before = page.before_image();
        assert_eq!(before.id(), pid(3));
        assert_eq!(before.row_count(), 1);
        assert!(!before.is_dirty());
    }

    #[test]
    fn test_page_rows_carry_record_ids() {
        let mut page = Page::empty(pid(2));
        page.insert_row(b"x").unwrap();
        page.insert_row(b"y").unwrap();

        let rids: Vec<_> = page.rows().map(|(rid, _)| rid).collect();
        assert_eq!(
            rids,
            vec![
                RecordId::new(pid(2), SlotId::new(0)),
                RecordId::new(pid(2), SlotId::new(1)),
            ]
        );
    }
}

use crate::common::{QuarryError, Result, SlotId, PAGE_SIZE};

/// Heap page layout:
///
/// +------------------+
/// | Header           |  num_slots: u16, data_len: u16
/// +------------------+
/// | Slot Directory   |  (grows toward the end of the page)
/// | [slot 0]         |
/// | [slot 1]         |
/// | ...              |
/// +------------------+
/// | Free Space       |
/// +------------------+
/// | Row Data         |  (grows toward the header)
/// +------------------+
///
/// Each slot entry holds the row offset and length as u16. An offset of 0
/// marks a free slot (no row can start inside the header). A zeroed buffer
/// is therefore a valid empty page, which is what a freshly extended file
/// reads back as.
const HEADER_SIZE: usize = 4;

/// Size of each slot entry in bytes
const SLOT_SIZE: usize = 4;

const NUM_SLOTS_OFFSET: usize = 0;
const DATA_LEN_OFFSET: usize = 2;

/// Largest row a single empty page can hold.
pub const MAX_ROW_SIZE: usize = PAGE_SIZE - HEADER_SIZE - SLOT_SIZE;

/// A slot directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotEntry {
    offset: u16,
    length: u16,
}

impl SlotEntry {
    const FREE: SlotEntry = SlotEntry {
        offset: 0,
        length: 0,
    };

    fn is_free(&self) -> bool {
        self.offset == 0
    }
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn write_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn num_slots(data: &[u8]) -> u16 {
    read_u16(data, NUM_SLOTS_OFFSET)
}

fn data_len(data: &[u8]) -> usize {
    read_u16(data, DATA_LEN_OFFSET) as usize
}

fn slot(data: &[u8], slot_id: SlotId) -> Option<SlotEntry> {
    if slot_id.as_u16() >= num_slots(data) {
        return None;
    }
    let at = HEADER_SIZE + slot_id.as_u16() as usize * SLOT_SIZE;
    Some(SlotEntry {
        offset: read_u16(data, at),
        length: read_u16(data, at + 2),
    })
}

fn row(data: &[u8], slot_id: SlotId) -> Result<&[u8]> {
    let entry = slot(data, slot_id).ok_or(QuarryError::InvalidSlotId(slot_id.as_u16()))?;
    if entry.is_free() {
        return Err(QuarryError::EmptySlot(slot_id.as_u16()));
    }
    let start = entry.offset as usize;
    Ok(&data[start..start + entry.length as usize])
}

fn occupied(data: &[u8]) -> impl Iterator<Item = (SlotId, SlotEntry)> + '_ {
    (0..num_slots(data)).filter_map(move |i| {
        let slot_id = SlotId::new(i);
        slot(data, slot_id)
            .filter(|e| !e.is_free())
            .map(|e| (slot_id, e))
    })
}

fn has_free_slot(data: &[u8]) -> bool {
    (0..num_slots(data)).any(|i| slot(data, SlotId::new(i)).is_some_and(|e| e.is_free()))
}

/// Contiguous bytes between the slot directory and the row data.
fn gap(data: &[u8]) -> usize {
    (PAGE_SIZE - HEADER_SIZE - num_slots(data) as usize * SLOT_SIZE).saturating_sub(data_len(data))
}

/// Bytes a compaction would recover from deleted rows.
fn dead_bytes(data: &[u8]) -> usize {
    let live: usize = occupied(data).map(|(_, e)| e.length as usize).sum();
    data_len(data) - live
}

fn has_room_for(data: &[u8], row_size: usize) -> bool {
    let slot_cost = if has_free_slot(data) { 0 } else { SLOT_SIZE };
    gap(data) + dead_bytes(data) >= row_size + slot_cost
}

/// Mutable view that interprets raw page bytes as a heap page.
pub struct HeapPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeapPage<'a> {
    /// Creates a heap page view over the given buffer.
    /// The buffer must be exactly PAGE_SIZE bytes.
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn num_slots(&self) -> u16 {
        num_slots(self.data)
    }

    /// Number of occupied slots.
    pub fn row_count(&self) -> usize {
        occupied(self.data).count()
    }

    /// Contiguous free bytes, not counting space held by deleted rows.
    pub fn free_space(&self) -> usize {
        gap(self.data)
    }

    pub fn has_room_for(&self, row_size: usize) -> bool {
        has_room_for(self.data, row_size)
    }

    pub fn row(&self, slot_id: SlotId) -> Result<&[u8]> {
        row(self.data, slot_id)
    }

    /// Inserts a row and returns the slot it was placed in.
    /// Free slots are reused before the directory grows.
    pub fn insert_row(&mut self, bytes: &[u8]) -> Result<SlotId> {
        let row_size = bytes.len();
        if row_size > MAX_ROW_SIZE || !self.has_room_for(row_size) {
            return Err(QuarryError::RowTooLarge {
                row_size,
                capacity: (gap(self.data) + dead_bytes(self.data)).saturating_sub(SLOT_SIZE),
            });
        }

        let reused = (0..self.num_slots())
            .map(SlotId::new)
            .find(|&s| slot(self.data, s).is_some_and(|e| e.is_free()));
        let slot_cost = if reused.is_some() { 0 } else { SLOT_SIZE };
        if gap(self.data) < row_size + slot_cost {
            self.compact();
        }

        let slot_id = match reused {
            Some(slot_id) => slot_id,
            None => {
                let n = self.num_slots();
                write_u16(self.data, NUM_SLOTS_OFFSET, n + 1);
                SlotId::new(n)
            }
        };

        let new_len = data_len(self.data) + row_size;
        let offset = PAGE_SIZE - new_len;
        self.data[offset..offset + row_size].copy_from_slice(bytes);
        write_u16(self.data, DATA_LEN_OFFSET, new_len as u16);
        self.set_slot(
            slot_id,
            SlotEntry {
                offset: offset as u16,
                length: row_size as u16,
            },
        );

        Ok(slot_id)
    }

    /// Frees a slot. Row bytes stay in place until the next compaction.
    pub fn delete_row(&mut self, slot_id: SlotId) -> Result<()> {
        let entry = slot(self.data, slot_id).ok_or(QuarryError::InvalidSlotId(slot_id.as_u16()))?;
        if entry.is_free() {
            return Err(QuarryError::EmptySlot(slot_id.as_u16()));
        }
        self.set_slot(slot_id, SlotEntry::FREE);
        Ok(())
    }

    /// Packs live rows against the end of the page, keeping their slot ids.
    pub fn compact(&mut self) {
        let live: Vec<(SlotId, Vec<u8>)> = occupied(self.data)
            .map(|(slot_id, e)| {
                let start = e.offset as usize;
                (slot_id, self.data[start..start + e.length as usize].to_vec())
            })
            .collect();

        let mut end = PAGE_SIZE;
        for (slot_id, bytes) in live {
            let offset = end - bytes.len();
            self.data[offset..end].copy_from_slice(&bytes);
            self.set_slot(
                slot_id,
                SlotEntry {
                    offset: offset as u16,
                    length: bytes.len() as u16,
                },
            );
            end = offset;
        }
        write_u16(self.data, DATA_LEN_OFFSET, (PAGE_SIZE - end) as u16);
    }

    fn set_slot(&mut self, slot_id: SlotId, entry: SlotEntry) {
        let at = HEADER_SIZE + slot_id.as_u16() as usize * SLOT_SIZE;
        write_u16(self.data, at, entry.offset);
        write_u16(self.data, at + 2, entry.length);
    }
}

/// Read-only view of a heap page.
pub struct HeapPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeapPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn num_slots(&self) -> u16 {
        num_slots(self.data)
    }

    pub fn row_count(&self) -> usize {
        occupied(self.data).count()
    }

    pub fn free_space(&self) -> usize {
        gap(self.data)
    }

    pub fn has_room_for(&self, row_size: usize) -> bool {
        has_room_for(self.data, row_size)
    }

    pub fn row(&self, slot_id: SlotId) -> Result<&'a [u8]> {
        row(self.data, slot_id)
    }

    /// Occupied rows in slot order.
    pub fn rows(&self) -> impl Iterator<Item = (SlotId, &'a [u8])> + 'a {
        let data = self.data;
        occupied(data).map(move |(slot_id, e)| {
            let start = e.offset as usize;
            (slot_id, &data[start..start + e.length as usize])
        })
    }
}

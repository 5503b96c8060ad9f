use thiserror::Error;

use super::types::{PageId, TableId, TransactionId};

/// Storage engine error types
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("{tid} aborted: waiting for {page_id} would deadlock")]
    Deadlock { tid: TransactionId, page_id: PageId },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool exhausted: all {capacity} cached pages are dirty or in use")]
    BufferPoolExhausted { capacity: usize },

    #[error("{page_id} does not belong to table {table_id}")]
    InvalidPageReference { page_id: PageId, table_id: TableId },

    #[error("Row of {row_size} bytes exceeds page capacity of {capacity} bytes")]
    RowTooLarge { row_size: usize, capacity: usize },

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(u16),

    #[error("Slot {0} is empty")]
    EmptySlot(u16),

    #[error("{0} not found")]
    TableNotFound(TableId),

    #[error("Log error: {0}")]
    Log(String),

    #[error("Commit of {tid} incomplete: {} page(s) not written ({source})", failed.len())]
    CommitIncomplete {
        tid: TransactionId,
        failed: Vec<PageId>,
        source: Box<QuarryError>,
    },
}

impl QuarryError {
    /// Returns true if the owning transaction must be rolled back and may be
    /// retried from the start.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuarryError::Deadlock { .. } | QuarryError::BufferPoolExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, QuarryError>;

use crate::common::{Result, TransactionId};

use super::page::Page;

/// Write-ahead log as seen from the buffer pool.
///
/// Commit appends one update record per dirty page and forces the log
/// before the page itself is written back. The record format belongs to the
/// log implementation.
pub trait LogSink: Send + Sync {
    /// Appends an update record carrying both page images.
    fn log_write(&self, tid: TransactionId, before: &Page, after: &Page) -> Result<()>;

    /// Makes every appended record durable.
    fn force(&self) -> Result<()>;
}

/// A log that records nothing, for stores that run without recovery.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl LogSink for NullLog {
    fn log_write(&self, _tid: TransactionId, _before: &Page, _after: &Page) -> Result<()> {
        Ok(())
    }

    fn force(&self) -> Result<()> {
        Ok(())
    }
}

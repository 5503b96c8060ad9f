//! Quarry - a page-oriented heap storage engine core
//!
//! This crate provides the transactional storage layer of a single-node
//! relational engine: tables are heap files of fixed-size pages, and every
//! page access goes through a buffer pool that enforces strict two-phase
//! locking with deadlock detection.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Storage Layer** (`storage`): Page persistence and row placement
//!   - `HeapFile`: One table's pages in a file, addressed by `page_no * PAGE_SIZE`
//!   - `HeapScan`: Lazy page-then-slot scan over a heap file
//!   - `Page` / `HeapPage`: Page bytes, dirty owner, before-image and slot layout
//!   - `LogSink`: The write-ahead log interface commit writes through
//!
//! - **Concurrency** (`concurrency`): Page-level locking
//!   - `LockManager`: Shared/exclusive page locks held until transaction end
//!   - `WaitForGraph`: Cycle detection run whenever a request has to wait
//!
//! - **Buffer Pool** (`buffer`): Memory management for pages
//!   - `BufferPool`: Lock-checked page cache, commit and abort
//!   - `LruList`: Recency ordering for LRU replacement under no-steal
//!
//! - **Catalog** (`catalog`): Table id to page store lookup
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry::buffer::BufferPool;
//! use quarry::catalog::MemoryCatalog;
//! use quarry::storage::disk::HeapFile;
//! use quarry::storage::log::NullLog;
//! use quarry::{TableId, TransactionId};
//!
//! let table_id = TableId::new(1);
//! let heap_file = Arc::new(HeapFile::open("people.tbl", table_id).unwrap());
//!
//! let catalog = MemoryCatalog::new();
//! catalog.add_table(heap_file.clone());
//! let pool = BufferPool::new(50, Arc::new(catalog), Arc::new(NullLog));
//!
//! let tid = TransactionId::next();
//! let rid = pool.insert_row(tid, table_id, b"Ada Lovelace").unwrap();
//! pool.commit(tid).unwrap();
//!
//! let tid = TransactionId::next();
//! for row in heap_file.scan(&pool, tid) {
//!     let row = row.unwrap();
//!     assert_eq!(row.rid, rid);
//! }
//! pool.commit(tid).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{
    LockMode, PageId, QuarryError, RecordId, Result, SlotId, TableId, TransactionId,
};

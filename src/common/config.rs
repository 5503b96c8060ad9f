/// Size of a page in bytes (4 KB). Shared by every table in the process.
pub const PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity, in pages
pub const DEFAULT_BUFFER_POOL_PAGES: usize = 50;

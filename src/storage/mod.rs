pub mod disk;
pub mod log;
pub mod page;

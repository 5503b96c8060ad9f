mod heap_page;
mod page;

pub use heap_page::*;
pub use page::*;

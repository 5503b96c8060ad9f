mod lock_manager;
mod wait_for_graph;

pub use lock_manager::*;
pub use wait_for_graph::*;

//! The storage surface: adapter capability, gateway, and result handling.

mod adapter;
mod gateway;
mod iterator;
mod memory;

pub use adapter::{Adapter, Rows};
pub use gateway::Gateway;
pub use iterator::RowIterator;
pub use memory::MemoryAdapter;

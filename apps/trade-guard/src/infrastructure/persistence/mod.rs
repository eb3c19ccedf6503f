//! Persistence Adapters
//!
//! Implementations of the `PositionStore` port.

pub mod in_memory;
pub mod json_file;

pub use in_memory::InMemoryPositionStore;
pub use json_file::JsonFilePositionStore;

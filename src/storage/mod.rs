pub mod duckdb;
pub mod memory;
pub mod traits;

pub use self::duckdb::DuckDbStore;
pub use memory::MemoryStore;
pub use traits::{Invocation, Storer, StorageError};

//! Access-token lookup from persisted client storage.

mod storage;
mod token;

pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use token::{StorageTokenProvider, TokenProvider};

//! Storage layer
//!
//! Handles persistence of the clue store snapshot.
//!
//! ## Architecture
//!
//! - **KeyValueStore**: durable string store, one value per key
//! - **Snapshot**: the whole store serialized as one JSON blob under a
//!   fixed key, read fully at startup and written fully after each change

pub mod error;
pub mod kv;
pub mod snapshot;

pub use error::{StorageError, StorageResult};
pub use kv::{FileKvStore, KeyValueStore, MemoryKvStore};
pub use snapshot::Snapshot;

/// Key under which the clue store snapshot lives
pub const STORE_KEY: &str = "clue_sets";

//! Durable cache namespaces for response snapshots.
//!
//! This module provides the store the fetch strategies fall back to:
//! - Three named namespaces (`offline`, `parties`, `static`), keyed by
//!   request identity
//! - Last-write-wins snapshot storage, no eviction, no staleness tracking
//! - SQLite for persistence across worker restarts, in-memory for tests

mod storage;
mod traits;

pub use storage::{MemoryStorage, SqliteStorage};
pub use traits::{CacheSet, CacheStore, CachedSnapshot, Namespace, NamespaceHandle};

//! Persistent tag caching with redb.
//!
//! Caches extracted tags per file, keyed by (path, mtime, size).
//! Unchanged files skip parsing entirely on warm runs.

mod store;

pub use store::{CacheStats, TagCache};

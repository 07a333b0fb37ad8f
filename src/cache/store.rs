//! Persistent tag cache using redb.
//!
//! Strategy: cache extracted tags per file, keyed by (path, mtime, size).
//! On a hit with matching freshness metadata, skip parsing entirely.
//!
//! Cache structure:
//! - Database: .repoatlas.cache/tags.redb (redb provides ACID guarantees)
//! - Key: file path (relative to project root)
//! - Value: bincode-serialized (mtime_secs, mtime_nanos, size, Vec<Tag>)
//!
//! Design decisions:
//! - Bincode for compact binary serialization
//! - mtime and size stored in the value for atomic validation (no
//!   separate metadata table)
//! - redb transactions give atomic entry replacement: a concurrent reader
//!   sees either the old entry or the new one, never a torn write
//! - Any read/deserialize failure is a miss, never an abort - the worst
//!   case is a cold re-extraction

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::types::Tag;

/// Table definition for the tag cache.
/// Key = file path (relative), Value = serialized CacheEntry
const TAGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tags");

/// Cache entry containing freshness metadata + extracted tags.
/// Stored as bincode bytes in redb for compact representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// Modification time seconds since UNIX_EPOCH
    mtime_secs: u64,
    /// Modification time nanoseconds component
    mtime_nanos: u32,
    /// File size in bytes at extraction time
    size: u64,
    /// Extracted tags for this file
    tags: Vec<Tag>,
}

impl CacheEntry {
    fn new(mtime: SystemTime, size: u64, tags: Vec<Tag>) -> Result<Self> {
        let duration = mtime
            .duration_since(SystemTime::UNIX_EPOCH)
            .context("file mtime is before UNIX_EPOCH")?;

        Ok(Self {
            mtime_secs: duration.as_secs(),
            mtime_nanos: duration.subsec_nanos(),
            size,
            tags,
        })
    }

    /// Check if this entry matches the given freshness metadata.
    /// A mutation that changes either mtime or size invalidates the entry.
    fn is_valid(&self, mtime: SystemTime, size: u64) -> bool {
        let Ok(duration) = mtime.duration_since(SystemTime::UNIX_EPOCH) else {
            return false;
        };

        self.size == size
            && self.mtime_secs == duration.as_secs()
            && self.mtime_nanos == duration.subsec_nanos()
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("failed to serialize cache entry")
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).context("failed to deserialize cache entry")
    }
}

/// Persistent tag cache backed by redb.
///
/// The cache is the only persisted state in the engine. Its lifecycle is
/// explicit: opened per invocation, dropped (closed) when the engine goes
/// away. There is no cross-invocation ordering requirement beyond per-key
/// freshness; concurrent invocations may race on writes and the last
/// writer wins.
pub struct TagCache {
    /// redb database handle (thread-safe)
    db: Database,
}

impl TagCache {
    /// Open or create the tag cache database.
    ///
    /// Cache location: `<root>/.repoatlas.cache/tags.redb`
    ///
    /// Returns an error if directory creation or database opening fails;
    /// the engine treats that error as "run without a cache", not as a
    /// fatal condition.
    pub fn open(root: &Path) -> Result<Self> {
        let cache_dir = root.join(".repoatlas.cache");

        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("failed to create cache directory: {}", cache_dir.display()))?;

        let db_path = cache_dir.join("tags.redb");
        let db = Database::create(&db_path)
            .with_context(|| format!("failed to open cache database: {}", db_path.display()))?;

        Ok(Self { db })
    }

    /// Get cached tags for a file if the entry is still fresh.
    ///
    /// Returns `Some(tags)` only when the file is present and both mtime
    /// and size match. Any failure along the read path (missing table,
    /// corrupt bytes) is a miss.
    pub fn get(&self, rel_fname: &str, mtime: SystemTime, size: u64) -> Option<Vec<Tag>> {
        let read_txn = self.db.begin_read().ok()?;
        let table = read_txn.open_table(TAGS_TABLE).ok()?;

        let value_guard = table.get(rel_fname).ok()??;
        let entry = CacheEntry::from_bytes(value_guard.value()).ok()?;

        if entry.is_valid(mtime, size) {
            Some(entry.tags)
        } else {
            None
        }
    }

    /// Store tags for a file with its current freshness metadata.
    ///
    /// Overwrites any existing entry for this path. The redb commit makes
    /// the replacement atomic.
    pub fn set(&self, rel_fname: &str, mtime: SystemTime, size: u64, tags: &[Tag]) -> Result<()> {
        let entry = CacheEntry::new(mtime, size, tags.to_vec())?;
        let bytes = entry.to_bytes()?;

        let write_txn = self
            .db
            .begin_write()
            .context("failed to begin cache write transaction")?;

        {
            let mut table = write_txn
                .open_table(TAGS_TABLE)
                .context("failed to open tags table")?;

            table
                .insert(rel_fname, bytes.as_slice())
                .with_context(|| format!("failed to insert cache entry for {rel_fname}"))?;
        }

        write_txn.commit().context("failed to commit cache write")?;

        Ok(())
    }

    /// Clear all cached entries. Does not delete the database file.
    pub fn clear(&self) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("failed to begin write transaction for clear")?;

        {
            let mut table = write_txn
                .open_table(TAGS_TABLE)
                .context("failed to open tags table")?;

            let keys: Vec<String> = table
                .iter()
                .ok()
                .into_iter()
                .flatten()
                .filter_map(|r| r.ok())
                .map(|(k, _)| k.value().to_string())
                .collect();

            for key in keys {
                table
                    .remove(key.as_str())
                    .context("failed to remove cache entry during clear")?;
            }
        }

        write_txn.commit().context("failed to commit cache clear")?;

        Ok(())
    }

    /// Get cache statistics for diagnostics.
    pub fn stats(&self) -> CacheStats {
        let read_txn = match self.db.begin_read() {
            Ok(txn) => txn,
            Err(_) => return CacheStats::default(),
        };

        let table = match read_txn.open_table(TAGS_TABLE) {
            Ok(t) => t,
            Err(_) => return CacheStats::default(),
        };

        let entries = table.len().unwrap_or(0) as usize;

        let size_bytes = table
            .iter()
            .ok()
            .into_iter()
            .flatten()
            .filter_map(|r| r.ok())
            .map(|(k, v)| k.value().len() + v.value().len())
            .sum::<usize>() as u64;

        CacheStats { entries, size_bytes }
    }
}

/// Cache statistics for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of files in the cache
    pub entries: usize,
    /// Approximate total size in bytes (keys + values)
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagKind;
    use std::sync::Arc;

    fn make_test_tag(name: &str) -> Tag {
        Tag {
            rel_fname: "test.rs".into(),
            fname: "/tmp/test.rs".into(),
            name: Arc::from(name),
            kind: TagKind::Def,
            line_start: 1,
            line_end: 3,
            node_type: "function".into(),
        }
    }

    #[test]
    fn test_cache_entry_freshness_validation() {
        let now = SystemTime::now();
        let entry = CacheEntry::new(now, 120, vec![make_test_tag("foo")]).unwrap();

        // Same mtime + size validates
        assert!(entry.is_valid(now, 120));

        // Different mtime does not
        let later = now + std::time::Duration::from_secs(1);
        assert!(!entry.is_valid(later, 120));

        // Same mtime but different size does not (content mutation)
        assert!(!entry.is_valid(now, 121));
    }

    #[test]
    fn test_cache_entry_serialization() {
        let now = SystemTime::now();
        let entry =
            CacheEntry::new(now, 64, vec![make_test_tag("foo"), make_test_tag("bar")]).unwrap();

        let bytes = entry.to_bytes().unwrap();
        let decoded = CacheEntry::from_bytes(&bytes).unwrap();

        assert_eq!(entry.mtime_secs, decoded.mtime_secs);
        assert_eq!(entry.mtime_nanos, decoded.mtime_nanos);
        assert_eq!(entry.size, decoded.size);
        assert_eq!(entry.tags, decoded.tags);
    }

    #[test]
    fn test_corrupt_bytes_are_a_miss() {
        let garbage = [0xde, 0xad, 0xbe, 0xef];
        assert!(CacheEntry::from_bytes(&garbage).is_err());
    }

    #[test]
    fn test_cache_roundtrip() -> Result<()> {
        let temp_dir = std::env::temp_dir().join("repoatlas_test_cache");
        let _ = fs::remove_dir_all(&temp_dir);
        fs::create_dir_all(&temp_dir)?;

        let cache = TagCache::open(&temp_dir)?;
        let now = SystemTime::now();
        let tags = vec![make_test_tag("test_fn")];

        cache.set("test.rs", now, 42, &tags)?;

        // Matching key returns the tags
        let retrieved = cache.get("test.rs", now, 42);
        assert_eq!(retrieved, Some(tags));

        // Stale mtime misses
        let later = now + std::time::Duration::from_secs(1);
        assert!(cache.get("test.rs", later, 42).is_none());

        // Stale size misses
        assert!(cache.get("test.rs", now, 43).is_none());

        fs::remove_dir_all(&temp_dir)?;
        Ok(())
    }

    #[test]
    fn test_cache_overwrite_replaces_entry() -> Result<()> {
        let temp_dir = std::env::temp_dir().join("repoatlas_test_cache_overwrite");
        let _ = fs::remove_dir_all(&temp_dir);
        fs::create_dir_all(&temp_dir)?;

        let cache = TagCache::open(&temp_dir)?;
        let t0 = SystemTime::now();
        let t1 = t0 + std::time::Duration::from_secs(5);

        cache.set("f.rs", t0, 10, &[make_test_tag("old")])?;
        cache.set("f.rs", t1, 12, &[make_test_tag("new")])?;

        // Old key no longer validates; new one does
        assert!(cache.get("f.rs", t0, 10).is_none());
        let tags = cache.get("f.rs", t1, 12).unwrap();
        assert_eq!(tags[0].name.as_ref(), "new");

        fs::remove_dir_all(&temp_dir)?;
        Ok(())
    }

    #[test]
    fn test_cache_clear_and_stats() -> Result<()> {
        let temp_dir = std::env::temp_dir().join("repoatlas_test_cache_clear");
        let _ = fs::remove_dir_all(&temp_dir);
        fs::create_dir_all(&temp_dir)?;

        let cache = TagCache::open(&temp_dir)?;
        let now = SystemTime::now();

        cache.set("file1.rs", now, 1, &[make_test_tag("fn1")])?;
        cache.set("file2.rs", now, 2, &[make_test_tag("fn2")])?;

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert!(stats.size_bytes > 0);

        cache.clear()?;
        assert_eq!(cache.stats().entries, 0);

        fs::remove_dir_all(&temp_dir)?;
        Ok(())
    }
}

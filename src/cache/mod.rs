//! File-backed snapshot cache
//!
//! Each source keeps exactly one cache record: the raw payload of its last
//! successful fetch, stored as `<key>-<label>.json` in the data directory.
//! The record is only read when the live fetch fails.
//!
//! Every write goes to its own temporary sibling and is renamed into place,
//! so a concurrent `load` sees either the old or the new record, never a
//! truncated one. Concurrent writers never share a temp file; the last
//! rename wins.
//!
//! # Example
//!
//! ```rust,ignore
//! use waqt::cache::SnapshotCache;
//!
//! let cache = SnapshotCache::new("/var/lib/waqt", "hicc.ie", "prayer_for_year");
//! cache.save(&payload).await?;
//! let restored = cache.load().await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::fetcher::RawPayload;
use crate::utils::error::CacheError;
use crate::utils::sanitize_filename;

/// Durable record of the last good payload for one source
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    /// Final cache file path
    path: PathBuf,
}

impl SnapshotCache {
    /// Create a cache scoped to a source key (host name) and label
    pub fn new(dir: impl AsRef<Path>, key: &str, label: &str) -> Self {
        let filename = format!("{}-{}.json", sanitize_filename(key), sanitize_filename(label));
        Self {
            path: dir.as_ref().join(filename),
        }
    }

    /// Path of the cache record
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unique temp sibling for one write
    fn temp_path(&self) -> PathBuf {
        static NEXT_WRITE: AtomicU64 = AtomicU64::new(0);

        let seq = NEXT_WRITE.fetch_add(1, Ordering::Relaxed);
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}.{seq}.tmp", std::process::id()));
        PathBuf::from(name)
    }

    /// Overwrite the record with a fresh payload
    pub async fn save(&self, payload: &RawPayload) -> Result<(), CacheError> {
        let write_failed = |reason: String| CacheError::WriteFailed {
            path: self.path.display().to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_failed(e.to_string()))?;
        }

        // Write to temp file first, then rename (atomic)
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, payload.as_bytes())
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(write_failed(e.to_string()));
        }

        tracing::debug!(path = %self.path.display(), bytes = payload.len(), "Cache record saved");
        Ok(())
    }

    /// Read the record back
    pub async fn load(&self) -> Result<RawPayload, CacheError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Cache record loaded");
                Ok(RawPayload::new(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CacheError::NotFound(self.path.display().to_string()))
            }
            Err(e) => Err(CacheError::ReadFailed {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Modification time of the record, if it exists
    pub async fn modified(&self) -> Option<SystemTime> {
        tokio::fs::metadata(&self.path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
    }

    /// Check whether a record exists
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_path() {
        let cache = SnapshotCache::new("/data", "hicc.ie", "prayer_for_year");
        assert_eq!(cache.path(), Path::new("/data/hicc.ie-prayer_for_year.json"));

        let first = cache.temp_path();
        let second = cache.temp_path();
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(Path::new("/data")));
        assert!(first
            .to_string_lossy()
            .starts_with("/data/hicc.ie-prayer_for_year.json."));
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .map(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
                    .unwrap_or(false)
            })
            .count()
    }

    #[tokio::test]
    async fn test_save_and_load_identical_bytes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(temp_dir.path(), "hicc.ie", "prayer_for_year");

        // Deliberately odd formatting: the record must not be re-serialized
        let payload = RawPayload::new("[ [ {\"d_date\" : \"2024-03-01\"} ] ]\n");
        cache.save(&payload).await.unwrap();

        let loaded = cache.load().await.unwrap();
        assert_eq!(loaded.as_bytes(), payload.as_bytes());
        assert_eq!(leftover_temp_files(temp_dir.path()), 0);
        assert!(cache.modified().await.is_some());
    }

    #[tokio::test]
    async fn test_load_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(temp_dir.path(), "nowhere.ie", "timetable");

        assert!(matches!(cache.load().await, Err(CacheError::NotFound(_))));
        assert!(!cache.exists().await);
        assert!(cache.modified().await.is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(temp_dir.path().join("nested"), "hub", "neohub");

        cache.save(&RawPayload::new("{\"a\":1}")).await.unwrap();
        cache.save(&RawPayload::new("{}")).await.unwrap();

        assert_eq!(cache.load().await.unwrap().as_bytes(), b"{}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_never_mix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(temp_dir.path(), "hicc.ie", "prayer_for_year");

        let large = RawPayload::new(format!("[\"{}\"]", "a".repeat(2 * 1024 * 1024)));
        let small = RawPayload::new("[\"b\"]");

        for _ in 0..10 {
            let writers: Vec<_> = (0..8)
                .map(|i| {
                    let cache = cache.clone();
                    let payload = if i % 2 == 0 { large.clone() } else { small.clone() };
                    tokio::spawn(async move { cache.save(&payload).await })
                })
                .collect();

            for writer in writers {
                writer.await.unwrap().unwrap();
            }

            let loaded = cache.load().await.unwrap();
            assert!(
                loaded.as_bytes() == large.as_bytes() || loaded.as_bytes() == small.as_bytes(),
                "record mixed two writes ({} bytes)",
                loaded.len()
            );
        }

        assert_eq!(leftover_temp_files(temp_dir.path()), 0);
    }
}

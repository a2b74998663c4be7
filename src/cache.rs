// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Activity File Cache
//!
//! Disk-backed store of raw activity file bytes keyed by workout id.
//!
//! The filesystem is the source of truth for which files exist: every cached
//! workout is stored as `<workout_id>.fit` below the cache directory, and the
//! in-memory index is rebuilt from a directory scan when the cache is opened.
//! The index tracks size and last access per entry so that a total byte
//! budget can be enforced with least-recently-accessed eviction.
//!
//! Reads never fail: a file that disappeared behind the cache's back is
//! reported as a miss and its stale index entry is dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::cache::FILE_EXTENSION;

/// Index entry for one cached file
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Location of the file on disk
    pub path: PathBuf,
    /// File size in bytes
    pub size_bytes: u64,
    /// Last time the entry was written or read
    pub last_accessed: SystemTime,
    /// Monotonic access counter, orders accesses sharing a timestamp
    access_seq: u64,
}

/// Totals removed by [`ActivityFileCache::clear`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSummary {
    pub count: usize,
    pub bytes: u64,
}

/// Snapshot of the cache state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub location: String,
}

/// Cache errors, only raised while writing
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<u64, CacheEntry>,
    total_bytes: u64,
    next_seq: u64,
}

impl CacheIndex {
    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn upsert(&mut self, id: u64, path: PathBuf, size_bytes: u64, accessed: SystemTime) {
        let access_seq = self.bump_seq();
        let entry = CacheEntry {
            path,
            size_bytes,
            last_accessed: accessed,
            access_seq,
        };
        if let Some(previous) = self.entries.insert(id, entry) {
            self.total_bytes -= previous.size_bytes;
        }
        self.total_bytes += size_bytes;
    }

    fn touch(&mut self, id: u64) {
        let access_seq = self.bump_seq();
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.last_accessed = SystemTime::now();
            entry.access_seq = access_seq;
        }
    }

    fn remove(&mut self, id: u64) -> Option<CacheEntry> {
        let entry = self.entries.remove(&id)?;
        self.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    /// Remove an entry only if nothing touched it since `access_seq` was read
    fn remove_if_unchanged(&mut self, id: u64, access_seq: u64) -> Option<CacheEntry> {
        match self.entries.get(&id) {
            Some(entry) if entry.access_seq == access_seq => self.remove(id),
            _ => None,
        }
    }

    /// Ids ordered from least to most recently accessed
    fn eviction_order(&self) -> Vec<u64> {
        let mut order: Vec<(SystemTime, u64, u64)> = self
            .entries
            .iter()
            .map(|(id, e)| (e.last_accessed, e.access_seq, *id))
            .collect();
        order.sort();
        order.into_iter().map(|(_, _, id)| id).collect()
    }
}

/// Byte-budgeted, access-ordered cache of raw activity files
///
/// All index mutation happens under a single async mutex per cache instance.
/// Anything that changes which `.fit` files exist (the rename that publishes
/// a write, eviction, delete, clear) runs while that mutex is held, so the
/// index and the directory never disagree. File contents are read and staged
/// in temporary files outside the lock.
pub struct ActivityFileCache {
    directory: PathBuf,
    max_bytes: u64,
    index: Mutex<CacheIndex>,
    tmp_counter: AtomicU64,
}

impl ActivityFileCache {
    /// Open the cache, rebuilding the index from the files already on disk
    ///
    /// A missing directory is not an error; it is created on the first write.
    /// Each file's modification time seeds its last-access time.
    pub async fn open(directory: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, CacheError> {
        let directory = directory.into();
        let mut found: Vec<(u64, PathBuf, u64, SystemTime)> = Vec::new();

        match fs::read_dir(&directory).await {
            Ok(mut dir) => {
                while let Some(item) = dir.next_entry().await? {
                    let path = item.path();
                    let Some(id) = workout_id_from_path(&path) else {
                        continue;
                    };
                    let metadata = match item.metadata().await {
                        Ok(m) if m.is_file() => m,
                        Ok(_) => continue,
                        Err(e) => {
                            warn!("Skipping unreadable cache file {}: {}", path.display(), e);
                            continue;
                        }
                    };
                    let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
                    found.push((id, path, metadata.len(), modified));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cache directory {} does not exist yet", directory.display());
            }
            Err(e) => return Err(e.into()),
        }

        // Seed access sequence numbers in modification order
        found.sort_by_key(|(id, _, _, modified)| (*modified, *id));
        let mut index = CacheIndex::default();
        for (id, path, size, modified) in found {
            index.upsert(id, path, size, modified);
        }

        info!(
            cache.directory = %directory.display(),
            cache.entries = index.entries.len(),
            cache.total_bytes = index.total_bytes,
            cache.max_bytes = max_bytes,
            "Activity file cache opened"
        );

        let cache = Self {
            directory,
            max_bytes,
            index: Mutex::new(index),
            tmp_counter: AtomicU64::new(0),
        };

        // A lowered budget takes effect immediately
        {
            let mut index = cache.index.lock().await;
            cache.evict_locked(&mut index).await;
        }

        Ok(cache)
    }

    /// Cached bytes for a workout, or `None` on a miss
    ///
    /// A hit refreshes the entry's access time. This never fetches.
    pub async fn get(&self, workout_id: u64) -> Option<Vec<u8>> {
        let (path, seen_seq) = {
            let index = self.index.lock().await;
            let entry = index.entries.get(&workout_id)?;
            (entry.path.clone(), entry.access_seq)
        };

        match fs::read(&path).await {
            Ok(bytes) => {
                self.index.lock().await.touch(workout_id);
                debug!(workout.id = workout_id, bytes = bytes.len(), "Activity cache hit");
                Some(bytes)
            }
            Err(e) => {
                warn!(
                    workout.id = workout_id,
                    "Cached activity file unreadable, dropping index entry: {}", e
                );
                // A concurrent set may have republished the file meanwhile
                self.index
                    .lock()
                    .await
                    .remove_if_unchanged(workout_id, seen_seq);
                None
            }
        }
    }

    /// Store bytes for a workout, then enforce the byte budget
    pub async fn set(&self, workout_id: u64, bytes: &[u8]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.directory).await?;

        let path = self.path_for(workout_id);
        let tmp_path = self.directory.join(format!(
            "{}.{}.tmp",
            workout_id,
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = fs::write(&tmp_path, bytes).await {
            remove_quietly(&tmp_path).await;
            return Err(e.into());
        }

        let mut index = self.index.lock().await;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            drop(index);
            remove_quietly(&tmp_path).await;
            return Err(e.into());
        }
        index.upsert(workout_id, path, bytes.len() as u64, SystemTime::now());
        debug!(workout.id = workout_id, bytes = bytes.len(), "Activity file cached");
        self.evict_locked(&mut index).await;
        Ok(())
    }

    /// Remove one workout's file; returns whether anything was removed
    pub async fn delete(&self, workout_id: u64) -> bool {
        let mut index = self.index.lock().await;
        let indexed = index.remove(workout_id).is_some();
        let removed_file = match fs::remove_file(self.path_for(workout_id)).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(workout.id = workout_id, "Failed to remove cached file: {}", e);
                false
            }
        };
        indexed || removed_file
    }

    /// Remove every cached file
    pub async fn clear(&self) -> ClearSummary {
        let mut index = self.index.lock().await;
        let mut summary = ClearSummary { count: 0, bytes: 0 };

        let ids: Vec<u64> = index.entries.keys().copied().collect();
        for id in ids {
            if let Some(entry) = index.remove(id) {
                remove_quietly(&entry.path).await;
                summary.count += 1;
                summary.bytes += entry.size_bytes;
            }
        }

        info!(
            cache.cleared_entries = summary.count,
            cache.cleared_bytes = summary.bytes,
            "Activity file cache cleared"
        );
        summary
    }

    pub async fn stats(&self) -> CacheStats {
        let index = self.index.lock().await;
        CacheStats {
            entry_count: index.entries.len(),
            total_bytes: index.total_bytes,
            max_bytes: self.max_bytes,
            location: self.directory.display().to_string(),
        }
    }

    pub async fn contains(&self, workout_id: u64) -> bool {
        self.index.lock().await.entries.contains_key(&workout_id)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, workout_id: u64) -> PathBuf {
        self.directory.join(format!("{}.{}", workout_id, FILE_EXTENSION))
    }

    /// Evict least-recently-accessed entries until the budget holds
    async fn evict_locked(&self, index: &mut CacheIndex) {
        if index.total_bytes <= self.max_bytes {
            return;
        }

        for id in index.eviction_order() {
            if index.total_bytes <= self.max_bytes {
                break;
            }
            if let Some(entry) = index.remove(id) {
                remove_quietly(&entry.path).await;
                info!(
                    workout.id = id,
                    bytes = entry.size_bytes,
                    cache.total_bytes = index.total_bytes,
                    "Evicted cached activity file"
                );
            }
        }
    }
}

fn workout_id_from_path(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != FILE_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_cache(dir: &TempDir, max_bytes: u64) -> ActivityFileCache {
        ActivityFileCache::open(dir.path().join("files"), max_bytes)
            .await
            .expect("Failed to open cache")
    }

    #[test]
    fn test_workout_id_from_path() {
        assert_eq!(workout_id_from_path(Path::new("/x/123.fit")), Some(123));
        assert_eq!(workout_id_from_path(Path::new("/x/123.7.tmp")), None);
        assert_eq!(workout_id_from_path(Path::new("/x/abc.fit")), None);
        assert_eq!(workout_id_from_path(Path::new("/x/123")), None);
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, 1024).await;

        let bytes = vec![0x0e, 0x10, 0xd9, 0x07, 0x00, 0x2e, 0x46, 0x49, 0x54];
        cache.set(42, &bytes).await.unwrap();

        assert_eq!(cache.get(42).await, Some(bytes));
        assert!(cache.contains(42).await);
    }

    #[tokio::test]
    async fn test_get_miss_returns_none() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, 1024).await;
        assert_eq!(cache.get(7).await, None);
    }

    #[tokio::test]
    async fn test_overwrite_updates_size() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, 1024).await;

        cache.set(1, &[1u8; 300]).await.unwrap();
        cache.set(1, &[2u8; 100]).await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_bytes, 100);
        assert_eq!(cache.get(1).await, Some(vec![2u8; 100]));
    }

    #[tokio::test]
    async fn test_recently_read_entry_survives_eviction() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, 1024).await;

        cache.set(1, &[1u8; 400]).await.unwrap();
        cache.set(2, &[2u8; 400]).await.unwrap();
        assert!(cache.get(1).await.is_some());
        cache.set(3, &[3u8; 400]).await.unwrap();

        assert!(cache.contains(1).await);
        assert!(!cache.contains(2).await);
        assert!(cache.contains(3).await);
        assert_eq!(cache.get(2).await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.total_bytes, 800);
        assert!(!dir.path().join("files").join("2.fit").exists());
    }

    #[tokio::test]
    async fn test_eviction_without_reads_drops_oldest_write() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, 1000).await;

        for id in 1..=4 {
            cache.set(id, &[0u8; 300]).await.unwrap();
        }

        assert!(!cache.contains(1).await);
        for id in 2..=4 {
            assert!(cache.contains(id).await);
        }
        assert_eq!(cache.stats().await.total_bytes, 900);
    }

    #[tokio::test]
    async fn test_clear_returns_totals() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, 10_000).await;

        cache.set(1, &[0u8; 100]).await.unwrap();
        cache.set(2, &[0u8; 250]).await.unwrap();
        cache.set(3, &[0u8; 50]).await.unwrap();

        let summary = cache.clear().await;
        assert_eq!(summary, ClearSummary { count: 3, bytes: 400 });

        for id in 1..=3 {
            assert_eq!(cache.get(id).await, None);
        }
        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.total_bytes, 0);
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, 10_000).await;

        cache.set(9, b"activity").await.unwrap();
        assert!(cache.delete(9).await);
        assert!(!cache.delete(9).await);
        assert_eq!(cache.get(9).await, None);
    }

    #[tokio::test]
    async fn test_vanished_file_self_heals() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, 10_000).await;

        cache.set(5, &[5u8; 64]).await.unwrap();
        std::fs::remove_file(dir.path().join("files").join("5.fit")).unwrap();

        assert_eq!(cache.get(5).await, None);
        assert!(!cache.contains(5).await);
        assert_eq!(cache.stats().await.total_bytes, 0);
    }

    #[tokio::test]
    async fn test_open_rebuilds_index_from_directory() {
        let dir = TempDir::new().unwrap();
        {
            let cache = open_cache(&dir, 10_000).await;
            cache.set(11, &[1u8; 10]).await.unwrap();
            cache.set(12, &[2u8; 20]).await.unwrap();
        }
        std::fs::write(dir.path().join("files").join("notes.txt"), b"ignored").unwrap();

        let reopened = open_cache(&dir, 10_000).await;
        let stats = reopened.stats().await;
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.total_bytes, 30);
        assert_eq!(reopened.get(12).await, Some(vec![2u8; 20]));
    }

    #[tokio::test]
    async fn test_open_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = ActivityFileCache::open(dir.path().join("does/not/exist"), 100)
            .await
            .unwrap();
        assert_eq!(cache.stats().await.entry_count, 0);

        cache.set(1, b"abc").await.unwrap();
        assert!(dir.path().join("does/not/exist/1.fit").exists());
    }
}

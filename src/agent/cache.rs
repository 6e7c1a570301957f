// AutoClipper EDL Cache
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// Validated EDLs keyed by (source identity, duration). Owned by the caller
// and handed to the pipeline; nothing here is global.

use crate::agent::edl::Edl;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// SHA-256 hex of `"{source}:{duration}"`.
    pub fn new(source: &str, duration_sec: f64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}", source, duration_sec).as_bytes());
        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub trait ClipCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Edl>>;
    fn set(&self, key: &CacheKey, edl: &Edl) -> Result<()>;
}

/// One JSON file per key. Entries older than the TTL (by mtime) are misses
/// and get deleted on sight.
pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, ttl })
    }

    pub fn with_ttl_days(dir: impl Into<PathBuf>, days: u64) -> Result<Self> {
        Self::new(dir, Duration::from_secs(days * SECS_PER_DAY))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }

    fn is_expired(&self, path: &Path) -> Result<bool> {
        let modified = fs::metadata(path)?.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(age >= self.ttl)
    }

    /// Remove every expired entry. Returns how many were deleted.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if self.is_expired(&path)? {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        info!("[CACHE] Removed {} expired entr(ies) from {:?}", removed, self.dir);
        Ok(removed)
    }
}

impl ClipCache for FileCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Edl>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        if self.is_expired(&path)? {
            debug!("[CACHE] Expired: {}", key.as_str());
            fs::remove_file(&path)?;
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<Edl>(&content) {
            Ok(edl) => {
                info!("[CACHE] Hit: {} ({} clips)", key.as_str(), edl.clips.len());
                Ok(Some(edl))
            }
            Err(e) => {
                warn!("[CACHE] Corrupt entry {:?} dropped: {}", path, e);
                fs::remove_file(&path)?;
                Ok(None)
            }
        }
    }

    fn set(&self, key: &CacheKey, edl: &Edl) -> Result<()> {
        let path = self.path_for(key);
        fs::write(&path, serde_json::to_string(edl)?)?;
        debug!("[CACHE] Stored {:?}", path);
        Ok(())
    }
}

/// Process-local cache with no expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Edl>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClipCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Edl>> {
        Ok(self
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned()))
    }

    fn set(&self, key: &CacheKey, edl: &Edl) -> Result<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.clone(), edl.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::edl::Candidate;

    fn sample() -> Edl {
        Edl::new(vec![Candidate::new("a", 0.0, 20.0, 0.9)], 120.0)
    }

    #[test]
    fn test_key_is_stable_sha256_hex() {
        let a = CacheKey::new("https://youtu.be/x", 120.0);
        let b = CacheKey::new("https://youtu.be/x", 120.0);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, CacheKey::new("https://youtu.be/x", 121.0));
        assert_ne!(a, CacheKey::new("https://youtu.be/y", 120.0));
    }

    #[test]
    fn test_file_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::with_ttl_days(dir.path(), 7).unwrap();
        let key = CacheKey::new("video", 120.0);
        assert!(cache.get(&key).unwrap().is_none());
        cache.set(&key, &sample()).unwrap();
        assert_eq!(cache.get(&key).unwrap(), Some(sample()));
    }

    #[test]
    fn test_expired_entries_are_misses_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), Duration::ZERO).unwrap();
        let key = CacheKey::new("video", 120.0);
        cache.set(&key, &sample()).unwrap();
        assert!(cache.get(&key).unwrap().is_none());
        assert!(!dir.path().join(format!("{}.json", key.as_str())).exists());
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let stale = FileCache::new(dir.path(), Duration::ZERO).unwrap();
        stale.set(&CacheKey::new("one", 1.0), &sample()).unwrap();
        stale.set(&CacheKey::new("two", 2.0), &sample()).unwrap();
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let fresh = FileCache::with_ttl_days(dir.path(), 7).unwrap();
        assert_eq!(fresh.cleanup_expired().unwrap(), 0);
        assert_eq!(stale.cleanup_expired().unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_corrupt_entry_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::with_ttl_days(dir.path(), 7).unwrap();
        let key = CacheKey::new("video", 120.0);
        fs::write(dir.path().join(format!("{}.json", key.as_str())), "{not json").unwrap();
        assert!(cache.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        let key = CacheKey::new("video", 120.0);
        assert!(cache.is_empty());
        cache.set(&key, &sample()).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key).unwrap(), Some(sample()));
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::warn;

use super::traits::CacheCapableStore;
use super::types::{
    oldest_keys, CacheEntry, CandidateFilter, CandidateRecord, LegacyEntry, LocationProfile,
};
use crate::utils::{CacheError, CacheResult};

const ENTRY_DIR: &str = "entries";
const LEGACY_DIR: &str = "legacy";
const PROFILES_FILE: &str = "profiles.json";
const FILE_EXTENSION: &str = "cache";
const KEY_LOCK_STRIPES: usize = 64;

/// On-disk envelope: LZ4-compressed bincode payload
#[derive(Debug, Serialize, Deserialize)]
struct StoredBlob {
    original_size: u64,
    data: Vec<u8>,
}

/// Directory-backed store: one compressed file per entry.
///
/// Files are sharded by the first two characters of the key, mirroring
/// how the exact key is already a hex digest.
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

#[derive(Debug)]
struct FileStoreInner {
    root: PathBuf,
    legacy: bool,
    profiles_lock: Mutex<()>,
    /// Serializes writers of the same file; touches and deletes read-modify-write
    key_locks: Vec<Mutex<()>>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        Self::open_with(root, false)
    }

    /// Open a store that also keeps the legacy record shape
    pub fn open_with_legacy(root: impl Into<PathBuf>) -> CacheResult<Self> {
        Self::open_with(root, true)
    }

    fn open_with(root: impl Into<PathBuf>, legacy: bool) -> CacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(ENTRY_DIR))?;
        if legacy {
            fs::create_dir_all(root.join(LEGACY_DIR))?;
        }
        Ok(Self {
            inner: Arc::new(FileStoreInner {
                root,
                legacy,
                profiles_lock: Mutex::new(()),
                key_locks: (0..KEY_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Run blocking filesystem work off the async executor
    async fn blocking<T, F>(&self, work: F) -> CacheResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileStoreInner) -> CacheResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || work(&inner))
            .await
            .map_err(|e| CacheError::StoreUnavailable(format!("file store task failed: {e}")))?
    }
}

impl FileStoreInner {
    fn path_for(&self, dir: &str, key: &str) -> PathBuf {
        let shard = key.get(..2).unwrap_or("__");
        self.root
            .join(dir)
            .join(shard)
            .join(format!("{key}.{FILE_EXTENSION}"))
    }

    fn lock_key(&self, dir: &str, key: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        (dir, key).hash(&mut hasher);
        let stripe = (hasher.finish() as usize) % self.key_locks.len();
        self.key_locks[stripe].lock()
    }

    /// Callers must hold the key lock
    fn write<T: Serialize>(&self, dir: &str, key: &str, value: &T) -> CacheResult<()> {
        let serialized = bincode::serialize(value)?;
        let compressed = lz4::block::compress(&serialized, None, false)?;
        let blob = StoredBlob {
            original_size: serialized.len() as u64,
            data: compressed,
        };

        let path = self.path_for(dir, key);
        let parent = path
            .parent()
            .ok_or_else(|| CacheError::StoreUnavailable(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(parent)?;

        // Write then rename so readers never observe a half-written file
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&bincode::serialize(&blob)?)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn decode<T: DeserializeOwned>(path: &Path, key: &str) -> CacheResult<T> {
        let raw = fs::read(path)?;
        let blob: StoredBlob =
            bincode::deserialize(&raw).map_err(|e| CacheError::malformed(key, e))?;
        let size = i32::try_from(blob.original_size)
            .map_err(|_| CacheError::malformed(key, "payload too large"))?;
        let decompressed = lz4::block::decompress(&blob.data, Some(size))
            .map_err(|e| CacheError::malformed(key, e))?;
        bincode::deserialize(&decompressed).map_err(|e| CacheError::malformed(key, e))
    }

    fn read<T: DeserializeOwned>(&self, dir: &str, key: &str) -> CacheResult<Option<T>> {
        let path = self.path_for(dir, key);
        if !path.exists() {
            return Ok(None);
        }
        Self::decode(&path, key).map(Some)
    }

    fn remove(&self, dir: &str, key: &str) -> CacheResult<bool> {
        let _guard = self.lock_key(dir, key);
        let path = self.path_for(dir, key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every cache file under `dir`, paired with its key
    fn list(&self, dir: &str) -> CacheResult<Vec<(String, PathBuf)>> {
        let base = self.root.join(dir);
        let mut files = Vec::new();
        if !base.exists() {
            return Ok(files);
        }

        for shard in fs::read_dir(&base)? {
            let shard = shard?;
            if !shard.path().is_dir() {
                continue;
            }
            for file in fs::read_dir(shard.path())? {
                let path = file?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                    continue;
                }
                if let Some(key) = path.file_stem().and_then(|s| s.to_str()) {
                    files.push((key.to_string(), path.clone()));
                }
            }
        }
        Ok(files)
    }

    /// Decode every record under `dir`, skipping files that fail to decode
    /// Set `last_accessed` in place; never recreates a deleted record
    fn touch<T, F>(&self, dir: &str, key: &str, stamp: F) -> CacheResult<bool>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let _guard = self.lock_key(dir, key);
        match self.read::<T>(dir, key)? {
            Some(mut record) => {
                stamp(&mut record);
                self.write(dir, key, &record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn upsert<T: Serialize>(&self, dir: &str, key: &str, value: &T) -> CacheResult<()> {
        let _guard = self.lock_key(dir, key);
        self.write(dir, key, value)
    }

    fn load_all<T: DeserializeOwned>(&self, dir: &str) -> CacheResult<Vec<T>> {
        let mut records = Vec::new();
        for (key, path) in self.list(dir)? {
            match Self::decode::<T>(&path, &key) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable cache file {}: {}", path.display(), e),
            }
        }
        Ok(records)
    }

    fn profiles_path(&self) -> PathBuf {
        self.root.join(PROFILES_FILE)
    }

    fn load_profiles(&self) -> CacheResult<HashMap<String, LocationProfile>> {
        let path = self.profiles_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl CacheCapableStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get_by_key(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let key = key.to_string();
        self.blocking(move |inner| inner.read(ENTRY_DIR, &key)).await
    }

    async fn upsert(&self, entry: CacheEntry) -> CacheResult<()> {
        self.blocking(move |inner| inner.upsert(ENTRY_DIR, &entry.key, &entry))
            .await
    }

    async fn query_candidates(&self, filter: &CandidateFilter) -> CacheResult<Vec<CandidateRecord>> {
        let filter = filter.clone();
        self.blocking(move |inner| {
            let entries: Vec<CacheEntry> = inner.load_all(ENTRY_DIR)?;
            Ok(filter.select(&entries))
        })
        .await
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<usize> {
        let keys = keys.to_vec();
        self.blocking(move |inner| {
            let mut removed = 0;
            for key in &keys {
                if inner.remove(ENTRY_DIR, key)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await
    }

    async fn touch_accessed(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        let key = key.to_string();
        self.blocking(move |inner| {
            inner.touch(ENTRY_DIR, &key, |entry: &mut CacheEntry| entry.last_accessed = at)
        })
        .await
    }

    async fn count_entries(&self) -> CacheResult<usize> {
        self.blocking(|inner| Ok(inner.list(ENTRY_DIR)?.len())).await
    }

    async fn least_recently_accessed(&self, limit: usize) -> CacheResult<Vec<String>> {
        self.blocking(move |inner| {
            let entries: Vec<CacheEntry> = inner.load_all(ENTRY_DIR)?;
            let mut victims = oldest_keys(
                entries.iter().map(|e| (e.key.as_str(), e.last_accessed)),
                limit,
            );
            // Unreadable files can never be touched again; evict them first
            let readable: std::collections::HashSet<&str> =
                entries.iter().map(|e| e.key.as_str()).collect();
            let mut corrupt: Vec<String> = inner
                .list(ENTRY_DIR)?
                .into_iter()
                .map(|(key, _)| key)
                .filter(|key| !readable.contains(key.as_str()))
                .collect();
            corrupt.append(&mut victims);
            corrupt.truncate(limit);
            Ok(corrupt)
        })
        .await
    }

    async fn upsert_location_profile(&self, profile: LocationProfile) -> CacheResult<()> {
        self.blocking(move |inner| {
            let _guard = inner.profiles_lock.lock();
            let mut profiles = inner.load_profiles().unwrap_or_else(|e| {
                warn!("Rebuilding unreadable location profiles: {}", e);
                HashMap::new()
            });
            profiles.insert(profile.location.clone(), profile);
            fs::write(inner.profiles_path(), serde_json::to_string_pretty(&profiles)?)?;
            Ok(())
        })
        .await
    }

    async fn get_location_profile(&self, location: &str) -> CacheResult<Option<LocationProfile>> {
        let location = location.to_string();
        self.blocking(move |inner| {
            let _guard = inner.profiles_lock.lock();
            Ok(inner.load_profiles()?.remove(&location))
        })
        .await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.blocking(|inner| {
            for dir in [ENTRY_DIR, LEGACY_DIR] {
                let path = inner.root.join(dir);
                if path.exists() {
                    fs::remove_dir_all(&path)?;
                }
            }
            fs::create_dir_all(inner.root.join(ENTRY_DIR))?;
            if inner.legacy {
                fs::create_dir_all(inner.root.join(LEGACY_DIR))?;
            }
            let profiles = inner.profiles_path();
            if profiles.exists() {
                fs::remove_file(profiles)?;
            }
            Ok(())
        })
        .await
    }

    fn supports_legacy(&self) -> bool {
        self.inner.legacy
    }

    async fn get_legacy(&self, key: &str) -> CacheResult<Option<LegacyEntry>> {
        if !self.inner.legacy {
            return Ok(None);
        }
        let key = key.to_string();
        self.blocking(move |inner| inner.read(LEGACY_DIR, &key)).await
    }

    async fn upsert_legacy(&self, entry: LegacyEntry) -> CacheResult<()> {
        if !self.inner.legacy {
            return Ok(());
        }
        self.blocking(move |inner| inner.upsert(LEGACY_DIR, &entry.key, &entry))
            .await
    }

    async fn touch_legacy(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        if !self.inner.legacy {
            return Ok(false);
        }
        let key = key.to_string();
        self.blocking(move |inner| {
            inner.touch(LEGACY_DIR, &key, |entry: &mut LegacyEntry| entry.last_accessed = at)
        })
        .await
    }

    async fn evict_legacy(&self, max_entries: usize) -> CacheResult<usize> {
        if !self.inner.legacy {
            return Ok(0);
        }
        self.blocking(move |inner| {
            let records: Vec<LegacyEntry> = inner.load_all(LEGACY_DIR)?;
            if records.len() <= max_entries {
                return Ok(0);
            }
            let victims = oldest_keys(
                records.iter().map(|e| (e.key.as_str(), e.last_accessed)),
                records.len() - max_entries,
            );
            for key in &victims {
                inner.remove(LEGACY_DIR, key)?;
            }
            Ok(victims.len())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(key: &str, accessed_secs: i64) -> CacheEntry {
        let at = Utc.timestamp_opt(1_700_000_000 + accessed_secs, 0).unwrap();
        CacheEntry {
            key: key.to_string(),
            location: "Madrid, Spain".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 14),
            feature_vector: r#"{"version":1}"#.to_string(),
            result: format!("result for {key}"),
            created_at: at,
            last_accessed: at,
        }
    }

    #[tokio::test]
    async fn test_roundtrip_and_count() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.upsert(entry("ab12", 1)).await.unwrap();
        store.upsert(entry("cd34", 2)).await.unwrap();

        assert_eq!(store.count_entries().await.unwrap(), 2);
        assert_eq!(store.get_by_key("ab12").await.unwrap(), Some(entry("ab12", 1)));
        assert_eq!(store.get_by_key("ffff").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.upsert(entry("ab12", 1)).await.unwrap();
        }
        let reopened = FileStore::open(dir.path()).unwrap();
        assert!(reopened.get_by_key("ab12").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_touch_delete_and_lru() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        for (key, secs) in [("aa01", 1), ("bb02", 2), ("cc03", 3)] {
            store.upsert(entry(key, secs)).await.unwrap();
        }

        let later = Utc.timestamp_opt(1_700_000_500, 0).unwrap();
        assert!(store.touch_accessed("aa01", later).await.unwrap());
        assert_eq!(
            store.least_recently_accessed(2).await.unwrap(),
            vec!["bb02".to_string(), "cc03".to_string()]
        );

        let removed = store.delete_many(&["bb02".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_entries().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.upsert(entry("ab12", 1)).await.unwrap();

        let path = dir.path().join(ENTRY_DIR).join("ab").join("ab12.cache");
        fs::write(&path, b"garbage").unwrap();

        let err = store.get_by_key("ab12").await.unwrap_err();
        assert!(matches!(err, CacheError::MalformedEntry { .. }));

        // Candidate scans skip it; eviction picks it first
        let query = crate::query::Query::new("Madrid", "2025-05-14", vec![6]);
        let filter = CandidateFilter::for_query(&query, 14, 10).unwrap();
        assert!(store.query_candidates(&filter).await.unwrap().is_empty());
        assert_eq!(store.least_recently_accessed(1).await.unwrap(), vec!["ab12"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_of_one_key_all_succeed() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        for round in 0..10 {
            let writers: Vec<_> = (0..8)
                .map(|i| {
                    let store = store.clone();
                    tokio::spawn(async move {
                        let mut record = entry("ab12", i);
                        record.result = format!("round {round} writer {i}");
                        store.upsert(record).await
                    })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap().unwrap();
            }
        }

        assert_eq!(store.count_entries().await.unwrap(), 1);
        let stored = store.get_by_key("ab12").await.unwrap().unwrap();
        assert!(stored.result.starts_with("round 9 writer "));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_touch_never_reverts_a_concurrent_upsert() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let later = Utc.timestamp_opt(1_700_000_500, 0).unwrap();

        for round in 0..50 {
            store.upsert(entry("ab12", 1)).await.unwrap();

            let toucher = {
                let store = store.clone();
                tokio::spawn(async move { store.touch_accessed("ab12", later).await })
            };
            let mut fresh = entry("ab12", 2);
            fresh.result = format!("new {round}");
            store.upsert(fresh).await.unwrap();
            toucher.await.unwrap().unwrap();

            let stored = store.get_by_key("ab12").await.unwrap().unwrap();
            assert_eq!(stored.result, format!("new {round}"));
        }
    }

    #[tokio::test]
    async fn test_touch_does_not_recreate_deleted_entry() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.upsert(entry("ab12", 1)).await.unwrap();
        store.delete_many(&["ab12".to_string()]).await.unwrap();

        let later = Utc.timestamp_opt(1_700_000_500, 0).unwrap();
        assert!(!store.touch_accessed("ab12", later).await.unwrap());
        assert_eq!(store.count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_touched_legacy_record_survives_eviction() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open_with_legacy(dir.path()).unwrap();
        for (key, secs) in [("aa01", 1), ("bb02", 2), ("cc03", 3)] {
            store.upsert_legacy(entry(key, secs).to_legacy()).await.unwrap();
        }

        let later = Utc.timestamp_opt(1_700_000_500, 0).unwrap();
        assert!(store.touch_legacy("aa01", later).await.unwrap());
        assert!(!store.touch_legacy("zz99", later).await.unwrap());

        assert_eq!(store.evict_legacy(2).await.unwrap(), 1);
        assert!(store.get_legacy("aa01").await.unwrap().is_some());
        assert!(store.get_legacy("bb02").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profiles_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open_with_legacy(dir.path()).unwrap();
        let profile = LocationProfile::from_location("Madrid, Spain", Utc::now());

        store.upsert_location_profile(profile.clone()).await.unwrap();
        store.upsert(entry("ab12", 1)).await.unwrap();
        store.upsert_legacy(entry("ab12", 1).to_legacy()).await.unwrap();
        assert_eq!(
            store.get_location_profile("Madrid, Spain").await.unwrap(),
            Some(profile)
        );
        assert!(store.get_legacy("ab12").await.unwrap().is_some());

        store.clear().await.unwrap();
        assert_eq!(store.count_entries().await.unwrap(), 0);
        assert!(store.get_legacy("ab12").await.unwrap().is_none());
        assert!(store.get_location_profile("Madrid, Spain").await.unwrap().is_none());
    }
}

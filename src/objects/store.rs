//! Object store implementation.

use super::{compression, frame};
use crate::config::Compression;
use crate::error::{Result, StoreError};
use crate::fs::FileSystem;
use crate::types::{DeltaRecord, DeltaSet, Hash, SaveId};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key of a decoded blob in the cache.
type BlobKey = (SaveId, String);

/// A decoded blob, remembered together with the hash of the stored bytes it
/// was decoded from.
struct CachedBlob {
    stored_hash: Hash,
    content: Vec<u8>,
}

/// A loaded delta set with its records indexed by path.
struct IndexedDeltaSet {
    set: DeltaSet,
    by_path: HashMap<String, usize>,
}

impl IndexedDeltaSet {
    fn new(set: DeltaSet) -> Self {
        let mut by_path = HashMap::with_capacity(set.deltas.len());
        for (i, delta) in set.deltas.iter().enumerate() {
            by_path.entry(delta.path.clone()).or_insert(i);
        }
        Self { set, by_path }
    }

    fn find(&self, path: &str) -> Option<&DeltaRecord> {
        self.by_path.get(path).map(|&i| &self.set.deltas[i])
    }
}

/// Blob and delta-set storage under the objects directory.
///
/// Blobs live at `<objects>/<save id>/<path>`, delta sets at
/// `<objects>/delta_<save id>.json`.
///
/// Blob reads always go to the filesystem; the cache only saves decoding
/// when the stored bytes are unchanged, so on-disk damage is reported on
/// every read. Delta sets are immutable once written and are cached whole.
pub struct ObjectStore {
    fs: Arc<dyn FileSystem>,

    /// Base directory for objects.
    dir: PathBuf,

    /// LRU cache of decoded, verified blobs. `None` when disabled.
    blobs: Option<Mutex<LruCache<BlobKey, CachedBlob>>>,

    /// LRU cache of decoded delta sets. `None` when disabled.
    delta_sets: Option<Mutex<LruCache<SaveId, Arc<IndexedDeltaSet>>>>,
}

impl ObjectStore {
    /// Create an object store rooted at `dir`. The directory is not created.
    ///
    /// `cache_size` bounds each cache (blobs and delta sets); zero disables
    /// caching.
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl AsRef<Path>, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size);
        Self {
            fs,
            dir: dir.as_ref().to_path_buf(),
            blobs: capacity.map(|n| Mutex::new(LruCache::new(n))),
            delta_sets: capacity.map(|n| Mutex::new(LruCache::new(n))),
        }
    }

    /// Store the full content of `path` as of `save_id`, replacing any
    /// previous blob under the same key.
    pub fn put_blob(
        &self,
        save_id: &SaveId,
        path: &str,
        content: &[u8],
        compression: Compression,
    ) -> Result<()> {
        let framed = frame::encode(content, compression)?;
        let blob_path = self.blob_path(save_id, path);

        if let Some(parent) = blob_path.parent() {
            self.fs
                .create_dir_all(parent)
                .map_err(|e| StoreError::io(parent, e))?;
        }
        self.fs
            .write(&blob_path, &framed)
            .map_err(|e| StoreError::io(&blob_path, e))?;

        if let Some(cache) = &self.blobs {
            cache.lock().put(
                (save_id.clone(), path.to_string()),
                CachedBlob {
                    stored_hash: Hash::from_bytes(&framed),
                    content: content.to_vec(),
                },
            );
        }

        tracing::debug!(save = %save_id, path, bytes = content.len(), "stored blob");
        Ok(())
    }

    /// Read and verify the blob for `path` at `save_id`.
    pub fn get_blob(&self, save_id: &SaveId, path: &str) -> Result<Vec<u8>> {
        let blob_path = self.blob_path(save_id, path);
        let raw = match self.fs.read(&blob_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::BlobNotFound {
                    save_id: save_id.clone(),
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(StoreError::io(&blob_path, e)),
        };

        let key = (save_id.clone(), path.to_string());
        let stored_hash = Hash::from_bytes(&raw);
        if let Some(cache) = &self.blobs {
            if let Some(cached) = cache.lock().get(&key) {
                if cached.stored_hash == stored_hash {
                    return Ok(cached.content.clone());
                }
            }
        }

        let content = frame::decode(raw, path)?;

        if let Some(cache) = &self.blobs {
            cache.lock().put(
                key,
                CachedBlob {
                    stored_hash,
                    content: content.clone(),
                },
            );
        }

        Ok(content)
    }

    /// Check if a blob exists, without reading it.
    pub fn has_blob(&self, save_id: &SaveId, path: &str) -> bool {
        self.fs.exists(&self.blob_path(save_id, path))
    }

    /// Persist every delta record of a save as one document.
    ///
    /// Patches are compressed individually when `compression` is enabled.
    pub fn put_delta_set(&self, set: &DeltaSet, compression: Compression) -> Result<()> {
        let mut stored = set.clone();
        if compression.is_enabled() {
            for delta in &mut stored.deltas {
                if delta.compressed {
                    continue;
                }
                if let Some(patch) = delta.patch.as_deref().filter(|p| !p.is_empty()) {
                    delta.patch = Some(compression::compress_to_hex(patch)?);
                    delta.compressed = true;
                }
            }
        }

        let data = serde_json::to_vec_pretty(&stored)?;
        let path = self.delta_set_path(&set.save_id);

        self.fs
            .create_dir_all(&self.dir)
            .map_err(|e| StoreError::io(&self.dir, e))?;
        self.fs
            .write(&path, &data)
            .map_err(|e| StoreError::io(&path, e))?;

        if let Some(cache) = &self.delta_sets {
            cache.lock().pop(&set.save_id);
        }

        tracing::debug!(save = %set.save_id, deltas = set.deltas.len(), "stored delta set");
        Ok(())
    }

    /// Load a save's delta records with their patches decompressed.
    pub fn get_delta_set(&self, save_id: &SaveId) -> Result<DeltaSet> {
        Ok(self.load_delta_set(save_id)?.set.clone())
    }

    /// The delta record a save holds for `path`, if any.
    pub fn find_delta(&self, save_id: &SaveId, path: &str) -> Result<Option<DeltaRecord>> {
        Ok(self.load_delta_set(save_id)?.find(path).cloned())
    }

    fn load_delta_set(&self, save_id: &SaveId) -> Result<Arc<IndexedDeltaSet>> {
        if let Some(cache) = &self.delta_sets {
            if let Some(loaded) = cache.lock().get(save_id) {
                return Ok(loaded.clone());
            }
        }

        let path = self.delta_set_path(save_id);
        let data = match self.fs.read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::DeltaSetNotFound(save_id.clone()))
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let mut set: DeltaSet = serde_json::from_slice(&data)
            .map_err(|e| StoreError::Deserialization(format!("delta set {}: {}", save_id, e)))?;

        for delta in &mut set.deltas {
            if !delta.compressed {
                continue;
            }
            if let Some(patch) = delta.patch.as_deref() {
                delta.patch = Some(compression::decompress_hex(patch)?);
            }
            delta.compressed = false;
        }

        let loaded = Arc::new(IndexedDeltaSet::new(set));
        if let Some(cache) = &self.delta_sets {
            cache.lock().put(save_id.clone(), loaded.clone());
        }
        Ok(loaded)
    }

    fn blob_path(&self, save_id: &SaveId, path: &str) -> PathBuf {
        self.dir.join(save_id.as_str()).join(path)
    }

    fn delta_set_path(&self, save_id: &SaveId) -> PathBuf {
        self.dir.join(format!("delta_{}.json", save_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn store_with(fs: &Arc<MemoryFileSystem>, cache_size: usize) -> ObjectStore {
        ObjectStore::new(fs.clone(), ".bit/objects", cache_size)
    }

    fn modified(path: &str, patch: &str) -> DeltaRecord {
        DeltaRecord {
            path: path.into(),
            is_new: false,
            is_deleted: false,
            base_id: Some(SaveId::from("base00000000")),
            patch: Some(patch.into()),
            content_hash: Hash::from_bytes(b"whatever"),
            compressed: false,
        }
    }

    #[test]
    fn test_store_and_retrieve() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = store_with(&fs, 0);
        let id = SaveId::from("aaaaaaaaaaaa");

        store
            .put_blob(&id, "src/lib.rs", b"pub fn f() {}", Compression::Enabled)
            .unwrap();

        assert!(store.has_blob(&id, "src/lib.rs"));
        assert!(!store.has_blob(&id, "src/main.rs"));
        assert_eq!(store.get_blob(&id, "src/lib.rs").unwrap(), b"pub fn f() {}");
    }

    #[test]
    fn test_put_overwrites() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = store_with(&fs, 16);
        let id = SaveId::from("aaaaaaaaaaaa");

        store.put_blob(&id, "a", b"one", Compression::Enabled).unwrap();
        store.put_blob(&id, "a", b"two", Compression::Enabled).unwrap();
        assert_eq!(store.get_blob(&id, "a").unwrap(), b"two");

        let fresh = store_with(&fs, 16);
        assert_eq!(fresh.get_blob(&id, "a").unwrap(), b"two");
    }

    #[test]
    fn test_missing_blob() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = store_with(&fs, 0);
        let result = store.get_blob(&SaveId::from("nope"), "a.txt");
        assert!(matches!(result, Err(StoreError::BlobNotFound { .. })));
    }

    #[test]
    fn test_corruption_detected_on_fresh_read() {
        let fs = Arc::new(MemoryFileSystem::new());
        let id = SaveId::from("cccccccccccc");
        store_with(&fs, 16)
            .put_blob(&id, "data.bin", b"trustworthy content", Compression::Disabled)
            .unwrap();

        assert!(fs.corrupt(".bit/objects/cccccccccccc/data.bin", 1));

        let err = store_with(&fs, 16).get_blob(&id, "data.bin").unwrap_err();
        assert!(err.is_integrity_error());
    }

    #[test]
    fn test_cached_blob_still_verified() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = store_with(&fs, 16);
        let id = SaveId::from("cccccccccccc");
        store
            .put_blob(&id, "data.bin", b"trustworthy content", Compression::Disabled)
            .unwrap();
        assert_eq!(store.get_blob(&id, "data.bin").unwrap(), b"trustworthy content");

        assert!(fs.corrupt(".bit/objects/cccccccccccc/data.bin", 1));
        assert!(store.get_blob(&id, "data.bin").unwrap_err().is_integrity_error());

        fs.remove_file(Path::new(".bit/objects/cccccccccccc/data.bin"))
            .unwrap();
        assert!(!store.has_blob(&id, "data.bin"));
        assert!(matches!(
            store.get_blob(&id, "data.bin"),
            Err(StoreError::BlobNotFound { .. })
        ));
    }

    #[test]
    fn test_blob_rewritten_behind_cache() {
        let fs = Arc::new(MemoryFileSystem::new());
        let id = SaveId::from("aaaaaaaaaaaa");
        let store = store_with(&fs, 16);
        store.put_blob(&id, "a", b"one", Compression::Enabled).unwrap();

        // Another writer replaces the blob with a valid one.
        store_with(&fs, 0)
            .put_blob(&id, "a", b"two", Compression::Enabled)
            .unwrap();
        assert_eq!(store.get_blob(&id, "a").unwrap(), b"two");
    }

    #[test]
    fn test_legacy_unframed_blob() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert(".bit/objects/legacy000000/old.txt", "written by hand");
        let store = store_with(&fs, 0);
        assert_eq!(
            store.get_blob(&SaveId::from("legacy000000"), "old.txt").unwrap(),
            b"written by hand"
        );
    }

    #[test]
    fn test_delta_set_patches_compressed_on_disk() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = store_with(&fs, 0);
        let id = SaveId::from("dddddddddddd");
        let patch = "@@ 1 1\n-1\n+68656c6c6f0a\n";
        let set = DeltaSet {
            save_id: id.clone(),
            deltas: vec![modified("a.txt", patch)],
        };

        store.put_delta_set(&set, Compression::Enabled).unwrap();

        let raw = fs
            .read(Path::new(".bit/objects/delta_dddddddddddd.json"))
            .unwrap();
        let on_disk: DeltaSet = serde_json::from_slice(&raw).unwrap();
        assert!(on_disk.deltas[0].compressed);
        assert_ne!(on_disk.deltas[0].patch.as_deref(), Some(patch));

        let loaded = store.get_delta_set(&id).unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_delta_set_uncompressed() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = store_with(&fs, 0);
        let id = SaveId::from("eeeeeeeeeeee");
        let set = DeltaSet {
            save_id: id.clone(),
            deltas: vec![modified("a.txt", "@@ 0 1\n+61\n")],
        };

        store.put_delta_set(&set, Compression::Disabled).unwrap();
        assert_eq!(store.get_delta_set(&id).unwrap(), set);
    }

    #[test]
    fn test_find_delta_by_path() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = store_with(&fs, 16);
        let id = SaveId::from("ffffffffffff");
        let set = DeltaSet {
            save_id: id.clone(),
            deltas: vec![
                modified("a.txt", "@@ 0 1\n+61\n"),
                modified("dir/b.txt", "@@ 0 1\n+62\n"),
            ],
        };
        store.put_delta_set(&set, Compression::Enabled).unwrap();

        for _ in 0..2 {
            let found = store.find_delta(&id, "dir/b.txt").unwrap().unwrap();
            assert_eq!(found.patch.as_deref(), Some("@@ 0 1\n+62\n"));
            assert!(!found.compressed);
            assert!(store.find_delta(&id, "c.txt").unwrap().is_none());
        }
    }

    #[test]
    fn test_delta_set_cache_refreshed_on_put() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = store_with(&fs, 16);
        let id = SaveId::from("ffffffffffff");
        let first = DeltaSet {
            save_id: id.clone(),
            deltas: vec![modified("a.txt", "@@ 0 1\n+61\n")],
        };
        store.put_delta_set(&first, Compression::Enabled).unwrap();
        assert_eq!(store.get_delta_set(&id).unwrap(), first);

        let second = DeltaSet {
            save_id: id.clone(),
            deltas: vec![modified("b.txt", "@@ 0 1\n+62\n")],
        };
        store.put_delta_set(&second, Compression::Enabled).unwrap();
        assert_eq!(store.get_delta_set(&id).unwrap(), second);
        assert!(store.find_delta(&id, "a.txt").unwrap().is_none());
    }

    #[test]
    fn test_missing_delta_set() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = store_with(&fs, 0);
        let result = store.get_delta_set(&SaveId::from("missing"));
        assert!(matches!(result, Err(StoreError::DeltaSetNotFound(_))));
    }
}

//! The on-disk response cache: a `cache/` payload directory, a `temp/`
//! staging directory for in-progress writes, and a SQL metadata store
//! tying cache-keys to HTTP metadata.
//!
//! Grounded on the original `HttpCache`/`HttpCacheDatabaseOpenHelper`
//! pair: cache-keys are content-addressed fingerprints of the request,
//! payloads are committed atomically by renaming out of `temp/`, and all
//! bookkeeping besides the bytes themselves lives in the metadata store.

mod control;
mod key;
mod record;
mod store;

pub use control::CacheControl;
pub use key::fingerprint;
pub use record::CacheRecord;
pub use store::CacheMetadataStore;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{Error, Result};

/// The cache's on-disk layout and metadata store, rooted at a single
/// directory.
pub struct CacheStorage {
    root: PathBuf,
    cache_dir: PathBuf,
    temp_dir: PathBuf,
    store: CacheMetadataStore,
    max_size: Option<u64>,
}

impl CacheStorage {
    /// Opens (creating if absent) a cache rooted at `root`. If `max_size` is
    /// set, `commit` evicts least-recently-used entries until total payload
    /// size fits within it.
    pub fn open(root: impl AsRef<Path>, max_size: Option<u64>) -> Result<CacheStorage> {
        let root = root.as_ref().to_path_buf();
        let cache_dir = root.join(constants::CACHE_DIR);
        let temp_dir = root.join(constants::TEMP_DIR);
        for dir in [&root, &cache_dir, &temp_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| Error::execution("failed to create cache directory").with_source(e))?;
        }
        let store = CacheMetadataStore::open(&root.join(constants::DB_FILE_NAME))?;
        Ok(CacheStorage {
            root,
            cache_dir,
            temp_dir,
            store,
            max_size,
        })
    }

    pub fn metadata(&self) -> &CacheMetadataStore {
        &self.store
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a payload for `cache_key` is committed to once fully written.
    pub fn payload_path(&self, cache_key: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{cache_key}{}", constants::CACHE_DATA_FILE_EXTENSION))
    }

    /// Path a payload for `cache_key` is staged to while still being
    /// written. Never read from directly; only ever renamed into place or
    /// discarded.
    pub fn temp_path(&self, cache_key: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{cache_key}{}", constants::CACHE_DATA_FILE_EXTENSION))
    }

    /// Atomically promotes a fully-written temp payload to its committed
    /// location and records its metadata. Called once the network body has
    /// been drained to EOF; never for a body abandoned mid-stream.
    pub fn commit(&self, record: CacheRecord) -> Result<()> {
        let temp = self.temp_path(&record.cache_key);
        let dest = self.payload_path(&record.cache_key);
        fs::rename(&temp, &dest)
            .map_err(|e| Error::execution("failed to commit cache payload").with_source(e))?;
        self.store.put(&record);
        if let Some(max_size) = self.max_size {
            self.enforce_max_size(max_size);
        }
        Ok(())
    }

    /// Evicts least-recently-used entries until total payload size is at or
    /// under `max_size`. Bounded by the number of entries on hand so a
    /// racing write can't turn this into an infinite loop.
    fn enforce_max_size(&self, max_size: u64) {
        for cache_key in self.store.enumerate_lru() {
            if self.store.total_size() <= max_size {
                break;
            }
            self.evict(&cache_key);
        }
    }

    /// Discards a temp payload that was never committed, e.g. because the
    /// caller cancelled the call before the body reached EOF.
    pub fn abort_temp(&self, cache_key: &str) {
        let temp = self.temp_path(cache_key);
        match fs::remove_file(&temp) {
            Ok(()) => {}
            Err(_) if !temp.exists() => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(%e, cache_key, "failed to discard aborted cache payload"),
        }
    }

    /// Removes both the metadata row and the committed payload for
    /// `cache_key`, if present.
    pub fn evict(&self, cache_key: &str) {
        self.store.delete(cache_key);
        let _ = fs::remove_file(self.payload_path(cache_key));
    }
}

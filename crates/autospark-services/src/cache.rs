//! Content-addressed cache of rendered mixes

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Only the head of the input file is hashed
const HASH_PREFIX_BYTES: u64 = 1024 * 1024;
const INDEX_FILE: &str = "cache_index.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt cache index: {0}")]
    Index(#[from] serde_json::Error),
}

impl CacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Identity of one render: input content plus every parameter that shapes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    input_name: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(input_file: &Path, speaker_id: &str, pitch_adjust: i32) -> Result<Self, CacheError> {
        let file_hash = file_digest(input_file)?;
        let input_name = input_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut params = BTreeMap::new();
        params.insert("file_hash".to_string(), file_hash);
        params.insert("speaker_id".to_string(), speaker_id.to_string());
        params.insert("pitch_adjust".to_string(), pitch_adjust.to_string());
        Ok(Self { input_name, params })
    }

    pub fn with_param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Hex SHA-256 over the parameters in key order
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in &self.params {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

/// Hex SHA-256 of the first MiB of a file
pub fn file_digest(path: &Path) -> Result<String, CacheError> {
    let file = File::open(path).map_err(|e| CacheError::io(path, e))?;
    let mut head = Vec::new();
    file.take(HASH_PREFIX_BYTES)
        .read_to_end(&mut head)
        .map_err(|e| CacheError::io(path, e))?;

    let mut hasher = Sha256::new();
    hasher.update(&head);
    Ok(hex::encode(hasher.finalize()))
}

/// Lookup and storage of finished renders
pub trait ResultCache: Send {
    fn get(&mut self, key: &CacheKey) -> Option<PathBuf>;
    /// Copy `output` into the cache and return the cached path
    fn put(&mut self, key: &CacheKey, output: &Path) -> Result<PathBuf, CacheError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    timestamp: u64,
    input_file: String,
    size: u64,
    params: BTreeMap<String, String>,
}

/// Directory of `<digest>.wav` files plus a JSON index
#[derive(Debug)]
pub struct FileResultCache {
    dir: PathBuf,
    index: BTreeMap<String, IndexEntry>,
}

impl FileResultCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        let index_path = dir.join(INDEX_FILE);
        let index = match fs::read_to_string(&index_path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %index_path.display(), "Discarding unreadable cache index: {e}");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(CacheError::io(&index_path, e)),
        };

        let mut cache = Self { dir, index };
        cache.prune_missing()?;
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Total bytes of cached audio tracked by the index
    pub fn total_size(&self) -> u64 {
        self.index.values().map(|e| e.size).sum()
    }

    /// Remove every cached file and reset the index
    pub fn clear(&mut self) -> Result<(), CacheError> {
        for digest in self.index.keys() {
            let path = self.entry_path(digest);
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(CacheError::io(&path, e));
                }
            }
        }
        self.index.clear();
        self.save_index()?;
        info!(dir = %self.dir.display(), "Cache cleared");
        Ok(())
    }

    fn entry_path(&self, digest: &str) -> PathBuf {
        self.dir.join(format!("{digest}.wav"))
    }

    fn prune_missing(&mut self) -> Result<(), CacheError> {
        let before = self.index.len();
        let dir = self.dir.clone();
        self.index.retain(|digest, _| dir.join(format!("{digest}.wav")).is_file());
        if self.index.len() != before {
            debug!(removed = before - self.index.len(), "Pruned stale cache entries");
            self.save_index()?;
        }
        Ok(())
    }

    fn save_index(&self) -> Result<(), CacheError> {
        let path = self.dir.join(INDEX_FILE);
        let text = serde_json::to_string_pretty(&self.index)?;
        fs::write(&path, text).map_err(|e| CacheError::io(&path, e))
    }
}

impl ResultCache for FileResultCache {
    fn get(&mut self, key: &CacheKey) -> Option<PathBuf> {
        let digest = key.digest();
        if !self.index.contains_key(&digest) {
            debug!(key = %digest, "Cache miss");
            return None;
        }

        let path = self.entry_path(&digest);
        if path.is_file() {
            info!(key = %digest, "Cache hit");
            return Some(path);
        }

        // Entry outlived its file
        self.index.remove(&digest);
        if let Err(e) = self.save_index() {
            warn!("Failed to update cache index: {e}");
        }
        None
    }

    fn put(&mut self, key: &CacheKey, output: &Path) -> Result<PathBuf, CacheError> {
        let digest = key.digest();
        let path = self.entry_path(&digest);
        let size = fs::copy(output, &path).map_err(|e| CacheError::io(output, e))?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.index.insert(
            digest.clone(),
            IndexEntry {
                timestamp,
                input_file: key.input_name.clone(),
                size,
                params: key.params.clone(),
            },
        );
        self.save_index()?;

        debug!(key = %digest, size, "Cached render");
        Ok(path)
    }
}

//! Keyed record stores
//!
//! A record store persists one opaque string value per key. The step runner
//! keeps one serialized session record per account in it. Three backends are
//! provided: one file per key on local disk, Redis, and an in-process map.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{RedisConfig, RedisPool};
use crate::error::{StoreError, StoreResult};

const MAX_FILE_STEM_LEN: usize = 100;

/// Durable key-value persistence for serialized records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the value stored under `key`, `None` when absent
    async fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the value stored under `key`
    ///
    /// `ttl` is a hint for backends with native expiry; backends without it
    /// keep the value until it is deleted.
    async fn write(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete the value stored under `key`; deleting an absent key succeeds
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

fn ensure_key(key: &str) -> StoreResult<()> {
    if key.trim().is_empty() {
        return Err(StoreError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

/// Map an arbitrary key onto a file stem that cannot escape the store directory
pub fn safe_file_stem(key: &str) -> String {
    static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();
    let regex = UNSAFE_CHARS
        .get_or_init(|| Regex::new(r"[^a-zA-Z0-9_\-@.]").expect("Failed to compile key regex"));

    regex
        .replace_all(key, "_")
        .chars()
        .take(MAX_FILE_STEM_LEN)
        .collect()
}

/// Stores each record as `<dir>/<safe key>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_file_stem(key)))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        ensure_key(key)?;
        let path = self.path_for(key);

        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StoreError::Corrupted(path.display().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn write(&self, key: &str, value: &str, _ttl: Option<Duration>) -> StoreResult<()> {
        ensure_key(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| io_error(&path, e))?;
        debug!("Wrote record file {}", path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        ensure_key(key)?;
        let path = self.path_for(key);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed record file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// Stores each record under `<prefix><key>` in Redis
#[derive(Clone)]
pub struct RedisStore {
    pool: RedisPool,
    key_prefix: String,
}

impl RedisStore {
    pub fn new(config: &RedisConfig) -> StoreResult<Self> {
        Ok(Self {
            pool: RedisPool::new(config)?,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    pub async fn health_check(&self) -> StoreResult<bool> {
        self.pool.health_check().await
    }
}

#[async_trait]
impl RecordStore for RedisStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        ensure_key(key)?;
        self.pool.get(&self.full_key(key)).await
    }

    async fn write(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        ensure_key(key)?;
        self.pool
            .set(&self.full_key(key), value, ttl.map(|t| t.as_secs()))
            .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        ensure_key(key)?;
        self.pool.delete(&self.full_key(key)).await
    }
}

/// In-process store, contents are lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        ensure_key(key)?;
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str, _ttl: Option<Duration>) -> StoreResult<()> {
        ensure_key(key)?;
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        ensure_key(key)?;
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

//! Small persistent key/value state and the manifest stored in it

use crate::cache::atomic::write_atomic;
use crate::error::{GateError, GateResult};
use crate::version::manifest::VersionManifest;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Key under which the last good manifest is persisted
pub const MANIFEST_KEY: &str = "version_info_json";

/// Persistent storage for small scalar state
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> GateResult<Option<String>>;
    async fn put(&self, key: &str, value: String) -> GateResult<()>;
    async fn remove(&self, key: &str) -> GateResult<()>;
    async fn clear(&self) -> GateResult<()>;
}

/// All keys in one JSON object file, rewritten atomically on every change
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> GateResult<BTreeMap<String, String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(GateError::io(
                    format!("reading state from {}", self.path.display()),
                    e,
                ))
            }
        };

        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(
                    "State file {} is corrupt, starting empty: {}",
                    self.path.display(),
                    e
                );
                Ok(BTreeMap::new())
            }
        }
    }

    async fn write_all(&self, map: &BTreeMap<String, String>) -> GateResult<()> {
        let content = serde_json::to_vec_pretty(map)?;
        write_atomic(&self.path, content).await.map_err(|e| {
            GateError::io(format!("writing state to {}", self.path.display()), e)
        })
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> GateResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn put(&self, key: &str, value: String) -> GateResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value);
        self.write_all(&map).await
    }

    async fn remove(&self, key: &str) -> GateResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        if map.remove(key).is_some() {
            self.write_all(&map).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> GateResult<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GateError::io(
                format!("removing {}", self.path.display()),
                e,
            )),
        }
    }
}

/// In-process store, mostly for tests
#[derive(Default)]
pub struct MemoryKeyValueStore {
    map: StdMutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> GateResult<T> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| GateError::Internal("state lock poisoned".to_string()))?;
        Ok(f(&mut map))
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> GateResult<Option<String>> {
        self.with_map(|m| m.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> GateResult<()> {
        self.with_map(|m| {
            m.insert(key.to_string(), value);
        })
    }

    async fn remove(&self, key: &str) -> GateResult<()> {
        self.with_map(|m| {
            m.remove(key);
        })
    }

    async fn clear(&self) -> GateResult<()> {
        self.with_map(|m| m.clear())
    }
}

/// Typed access to the persisted manifest
#[derive(Clone)]
pub struct ManifestStore {
    store: Arc<dyn KeyValueStore>,
}

impl ManifestStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Last persisted manifest; unparseable state reads as absent
    pub async fn load(&self) -> GateResult<Option<VersionManifest>> {
        let Some(raw) = self.store.get(MANIFEST_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(e) => {
                warn!("Ignoring unparseable persisted manifest: {}", e);
                Ok(None)
            }
        }
    }

    /// Overwrite the persisted manifest
    pub async fn save(&self, manifest: &VersionManifest) -> GateResult<()> {
        let raw = serde_json::to_string(manifest)?;
        self.store.put(MANIFEST_KEY, raw).await?;
        debug!("Persisted manifest {}", manifest.version);
        Ok(())
    }

    pub async fn clear(&self) -> GateResult<()> {
        self.store.remove(MANIFEST_KEY).await
    }
}

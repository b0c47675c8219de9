//! Tiered hash manifest store
//!
//! Lookups go memory → disk → network. A network load writes the raw
//! document to disk and the parsed index to memory, so the next process
//! start can verify without reaching the origin.
//!
//! Concurrent first loads of one namespace share a single fetch and its
//! outcome. A failed load is remembered for a short while so a burst of
//! requests against a missing or unreachable manifest costs one round trip.

use crate::cache::atomic::write_atomic;
use crate::cache::CacheNamespace;
use crate::error::{GateError, GateResult};
use crate::integrity::coalesce::LoadCoalescer;
use crate::integrity::{HashAlgorithm, HashIndex};
use crate::origin::OriginEndpoint;
use crate::transport::HttpTransport;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// How long a failed load answers for its namespace before the next fetch
pub const FAILURE_TTL: Duration = Duration::from_secs(5);

type SharedLoad = Result<Arc<HashIndex>, Arc<GateError>>;

pub struct HashIndexStore {
    endpoint: OriginEndpoint,
    transport: Arc<dyn HttpTransport>,
    root: PathBuf,
    algorithm: HashAlgorithm,
    timeout: Duration,
    memory: RwLock<HashMap<CacheNamespace, Arc<HashIndex>>>,
    failures: RwLock<HashMap<CacheNamespace, (Instant, Arc<GateError>)>>,
    failure_ttl: Duration,
    inflight: LoadCoalescer<SharedLoad>,
}

impl HashIndexStore {
    pub fn new(
        endpoint: OriginEndpoint,
        transport: Arc<dyn HttpTransport>,
        root: impl Into<PathBuf>,
        algorithm: HashAlgorithm,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            transport,
            root: root.into(),
            algorithm,
            timeout,
            memory: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            failure_ttl: FAILURE_TTL,
            inflight: LoadCoalescer::new(),
        }
    }

    /// Override how long a failed load is remembered
    pub fn with_failure_ttl(mut self, ttl: Duration) -> Self {
        self.failure_ttl = ttl;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Disk location of a namespace's hash manifest
    pub fn disk_path(&self, namespace: &CacheNamespace) -> PathBuf {
        self.root.join(format!("{}.json", namespace.file_stem()))
    }

    /// Load the index for `namespace`, trying memory, then disk, then network
    pub async fn load_for(&self, namespace: &CacheNamespace) -> GateResult<Arc<HashIndex>> {
        if let Some(index) = self.cached(namespace).await {
            return Ok(index);
        }
        if let Some(err) = self.recent_failure(namespace).await {
            return Err(err.replicate());
        }

        self.inflight
            .run(namespace.as_str(), || self.load_shared(namespace))
            .await
            .map_err(|e| e.replicate())
    }

    async fn load_shared(&self, namespace: &CacheNamespace) -> SharedLoad {
        // A previous run may have settled after this caller's first check.
        if let Some(index) = self.cached(namespace).await {
            return Ok(index);
        }
        if let Some(err) = self.recent_failure(namespace).await {
            return Err(err);
        }

        let loaded = match self.load_disk(namespace).await {
            Some(index) => Ok(index),
            None => self.fetch(namespace).await,
        };

        match loaded {
            Ok(index) => {
                let index = Arc::new(index);
                self.failures.write().await.remove(namespace);
                self.memory
                    .write()
                    .await
                    .insert(namespace.clone(), Arc::clone(&index));
                Ok(index)
            }
            Err(e) => {
                warn!("Hash manifest for {} failed to load: {}", namespace, e);
                let e = Arc::new(e);
                if !self.failure_ttl.is_zero() {
                    self.failures
                        .write()
                        .await
                        .insert(namespace.clone(), (Instant::now(), Arc::clone(&e)));
                }
                Err(e)
            }
        }
    }

    /// Failure of a load that settled less than the failure TTL ago
    async fn recent_failure(&self, namespace: &CacheNamespace) -> Option<Arc<GateError>> {
        self.failures
            .read()
            .await
            .get(namespace)
            .filter(|(at, _)| at.elapsed() < self.failure_ttl)
            .map(|(_, err)| Arc::clone(err))
    }

    /// Expected content digest for `relative_path`, if listed
    pub fn lookup(index: &HashIndex, relative_path: &str) -> Option<String> {
        index.expected_for(relative_path).map(str::to_string)
    }

    /// Memory tier only
    pub async fn cached(&self, namespace: &CacheNamespace) -> Option<Arc<HashIndex>> {
        self.memory
            .read()
            .await
            .get(namespace)
            .filter(|index| !index.is_empty())
            .cloned()
    }

    /// Install a new index for `namespace` in both tiers
    pub async fn replace(&self, namespace: &CacheNamespace, index: HashIndex) -> GateResult<()> {
        let path = self.disk_path(namespace);
        write_atomic(&path, index.to_json()?.into_bytes())
            .await
            .map_err(|e| GateError::io(format!("writing {}", path.display()), e))?;

        info!(
            "Replaced hash index for {} ({} records)",
            namespace,
            index.len()
        );
        self.failures.write().await.remove(namespace);
        self.memory
            .write()
            .await
            .insert(namespace.clone(), Arc::new(index));
        Ok(())
    }

    /// Drop both tiers for one namespace
    pub async fn invalidate(&self, namespace: &CacheNamespace) -> GateResult<()> {
        self.memory.write().await.remove(namespace);
        self.failures.write().await.remove(namespace);
        remove_if_exists(&self.disk_path(namespace)).await
    }

    pub async fn clear_memory(&self) {
        self.memory.write().await.clear();
        self.failures.write().await.clear();
        self.inflight.prune().await;
    }

    /// Delete every cached hash manifest file
    pub async fn clear_disk(&self) -> GateResult<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GateError::io(
                format!("clearing {}", self.root.display()),
                e,
            )),
        }
    }

    /// Bytes used by cached hash manifest files
    pub async fn disk_size(&self) -> GateResult<u64> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(GateError::io(format!("reading {}", self.root.display()), e)),
        };

        let mut total = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }

    /// Total records held in memory across all namespaces
    pub async fn memory_entries(&self) -> usize {
        self.memory.read().await.values().map(|i| i.len()).sum()
    }

    /// Namespaces with an index in memory
    pub async fn memory_namespaces(&self) -> Vec<CacheNamespace> {
        let mut names: Vec<_> = self.memory.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn load_disk(&self, namespace: &CacheNamespace) -> Option<HashIndex> {
        let path = self.disk_path(namespace);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read hash cache {}: {}", path.display(), e);
                return None;
            }
        };

        match HashIndex::parse(self.algorithm, &content) {
            Ok(index) => {
                debug!("Hash index for {} loaded from disk", namespace);
                Some(index)
            }
            Err(e) => {
                warn!("Discarding corrupt hash cache {}: {}", path.display(), e);
                if let Err(e) = remove_if_exists(&path).await {
                    warn!("{}", e);
                }
                None
            }
        }
    }

    async fn fetch(&self, namespace: &CacheNamespace) -> GateResult<HashIndex> {
        let url = self.endpoint.hash_manifest_url(namespace);
        debug!("Fetching hash manifest from {}", url);

        let response = tokio::time::timeout(
            self.timeout,
            self.transport.get(&url, self.endpoint.headers()),
        )
        .await
        .map_err(|_| GateError::RequestTimeout(url.clone()))?
        .map_err(|e| match e {
            GateError::RequestTimeout(u) => GateError::RequestTimeout(u),
            other => GateError::ResourceDownloadFailed(other.to_string()),
        })?;

        if matches!(response.status, 404 | 410) {
            return Err(GateError::ResourceNotFound(format!(
                "HTTP {} from {}",
                response.status, url
            )));
        }
        if !response.is_success() {
            return Err(GateError::ResourceDownloadFailed(format!(
                "HTTP {} from {}",
                response.status, url
            )));
        }

        let content = String::from_utf8(response.body)
            .map_err(|e| GateError::ResourceParseError(e.to_string()))?;
        let index = HashIndex::parse(self.algorithm, &content).map_err(|e| match e {
            GateError::ResourceContentNull(_) => GateError::ResourceContentNull(url.clone()),
            other => other,
        })?;

        let path = self.disk_path(namespace);
        if let Err(e) = write_atomic(&path, content.into_bytes()).await {
            warn!("Cannot persist hash manifest {}: {}", path.display(), e);
        }

        info!(
            "Loaded hash manifest for {} ({} records)",
            namespace,
            index.len()
        );
        Ok(index)
    }
}

async fn remove_if_exists(path: &Path) -> GateResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GateError::io(format!("removing {}", path.display()), e)),
    }
}

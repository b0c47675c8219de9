//! Gateway wiring
//!
//! `Gateway` assembles the resolver, caches and interception server from a
//! `Config`. `BlockingGateway` wraps it in its own runtime for hosts whose
//! request callback is synchronous.

use crate::audit::AuditLog;
use crate::cache::{CacheLifecycleManager, CacheNamespace, NamespaceKey, ResourceCache};
use crate::config::{Config, ConfigManager};
use crate::error::{GateError, GateResult};
use crate::integrity::HashIndexStore;
use crate::origin::{InterceptResponse, OriginEndpoint, OriginFallbackServer, ServerOptions};
use crate::transport::{HttpTransport, UreqTransport};
use crate::version::{
    DeviceContext, FileKeyValueStore, HttpVersionApiClient, KeyValueStore, ManifestStore,
    NetworkProbe, ResolveOrigin, TcpProbe, VersionApiClient, VersionManifest, VersionResolver,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Probe connect timeout; the probe only short-circuits obviously offline hosts
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Injectable collaborators
pub struct Collaborators {
    pub transport: Arc<dyn HttpTransport>,
    pub client: Arc<dyn VersionApiClient>,
    pub probe: Arc<dyn NetworkProbe>,
    pub state: Arc<dyn KeyValueStore>,
    pub audit: Arc<AuditLog>,
}

impl Collaborators {
    /// Production collaborators for `config`
    pub fn from_config(config: &Config) -> Self {
        let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::new(
            config.origin.request_timeout(),
            config.cache.max_body_bytes(),
        ));
        let endpoint = OriginEndpoint::from_config(&config.origin);
        let client = Arc::new(HttpVersionApiClient::new(
            endpoint,
            Arc::clone(&transport),
            config.api.api_name.as_str(),
            config.api.timeout(),
        ));

        Self {
            transport,
            client,
            probe: Arc::new(TcpProbe::for_url(&config.origin.base_url, PROBE_TIMEOUT)),
            state: Arc::new(FileKeyValueStore::new(ConfigManager::state_file())),
            audit: Arc::new(AuditLog::new(config)),
        }
    }
}

/// Result of `Gateway::initialize`
#[derive(Debug, Clone, Serialize)]
pub struct Initialized {
    pub manifest: VersionManifest,
    pub origin: ResolveOrigin,
    pub namespace: CacheNamespace,
}

/// Size of one namespace on disk
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceUsage {
    pub namespace: CacheNamespace,
    pub bytes: u64,
    pub active: bool,
}

/// Point-in-time view of gateway state
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub active: Option<CacheNamespace>,
    pub persisted: Option<VersionManifest>,
    pub namespaces: Vec<NamespaceUsage>,
    pub total_bytes: u64,
    pub hash_disk_bytes: u64,
    pub hash_memory_records: usize,
}

pub struct Gateway {
    resolver: Arc<VersionResolver>,
    lifecycle: Arc<CacheLifecycleManager>,
    hashes: Arc<HashIndexStore>,
    manifests: ManifestStore,
    server: OriginFallbackServer,
    namespace_key: NamespaceKey,
    intercept_prefixes: Vec<String>,
    app_version: String,
}

impl Gateway {
    /// Gateway using the network, filesystem and state paths from `config`
    pub fn from_config(config: &Config) -> Self {
        Self::with_collaborators(config, Collaborators::from_config(config))
    }

    pub fn with_collaborators(config: &Config, parts: Collaborators) -> Self {
        let endpoint = OriginEndpoint::from_config(&config.origin);
        let manifests = ManifestStore::new(parts.state);

        let lifecycle = Arc::new(CacheLifecycleManager::new(
            ResourceCache::new(ConfigManager::cache_root(config)),
            Arc::clone(&parts.audit),
        ));
        let hashes = Arc::new(HashIndexStore::new(
            endpoint.clone(),
            Arc::clone(&parts.transport),
            ConfigManager::hash_root(config),
            config.integrity.algorithm,
            config.origin.hash_timeout(),
        ));
        let resolver = Arc::new(VersionResolver::new(
            parts.client,
            parts.probe,
            manifests.clone(),
            DeviceContext::from_config(&config.api),
            config.api.success_code.as_str(),
            Arc::clone(&parts.audit),
        ));
        let server = OriginFallbackServer::new(
            Arc::clone(&lifecycle),
            Arc::clone(&hashes),
            manifests.clone(),
            endpoint,
            parts.transport,
            ServerOptions {
                namespace_key: config.cache.namespace_key,
                timeout: config.origin.request_timeout(),
                default_charset: config.origin.default_charset.clone(),
                require_listed: config.integrity.require_listed,
            },
            parts.audit,
        );

        Self {
            resolver,
            lifecycle,
            hashes,
            manifests,
            server,
            namespace_key: config.cache.namespace_key,
            intercept_prefixes: config.origin.intercept_prefixes.clone(),
            app_version: config.api.app_version.clone(),
        }
    }

    /// Resolve the manifest and activate its namespace
    pub async fn initialize(&self) -> GateResult<Initialized> {
        let (manifest, origin) = self.resolver.resolve().await?;
        let namespace = manifest
            .namespace(self.namespace_key)
            .map_err(|e| GateError::ApiResponseError {
                code: manifest.res_code.clone().unwrap_or_default(),
                message: e.to_string(),
            })?;
        self.lifecycle.activate(&namespace).await?;

        if manifest.force_update() {
            info!("Manifest {} requires an app update", manifest.version);
        }
        Ok(Initialized {
            manifest,
            origin,
            namespace,
        })
    }

    /// Serve one intercepted request
    pub async fn intercept(&self, path: &str, query: Option<&str>) -> InterceptResponse {
        self.server.intercept(path, query).await
    }

    /// Whether a renderer request path should be routed through the gateway
    pub fn should_intercept(&self, path: &str) -> bool {
        self.intercept_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// True when the persisted manifest advertises a newer app
    pub async fn app_update_available(&self) -> GateResult<bool> {
        Ok(self
            .manifests
            .load()
            .await?
            .is_some_and(|m| m.app_update_available(&self.app_version)))
    }

    /// Clear persisted state, every namespace, and both hash tiers
    pub async fn clear_all_caches(&self) -> GateResult<()> {
        self.resolver.clear().await?;
        self.lifecycle.evict_all().await?;
        self.hashes.clear_memory().await;
        self.hashes.clear_disk().await?;
        info!("All caches cleared");
        Ok(())
    }

    /// Evict one namespace along with its hash manifest
    pub async fn evict(&self, namespace: &CacheNamespace) -> GateResult<bool> {
        let removed = self.lifecycle.evict(namespace).await?;
        self.hashes.invalidate(namespace).await?;
        Ok(removed)
    }

    pub async fn status(&self) -> GateResult<GatewayStatus> {
        let active = self.lifecycle.active().await;
        let mut namespaces = Vec::new();
        for namespace in self.lifecycle.list_namespaces().await? {
            namespaces.push(NamespaceUsage {
                bytes: self.lifecycle.size_of(&namespace).await?,
                active: active.as_ref() == Some(&namespace),
                namespace,
            });
        }

        Ok(GatewayStatus {
            active,
            persisted: self.resolver.persisted().await?,
            namespaces,
            total_bytes: self.lifecycle.total_size().await?,
            hash_disk_bytes: self.hashes.disk_size().await?,
            hash_memory_records: self.hashes.memory_entries().await,
        })
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    pub fn lifecycle(&self) -> &CacheLifecycleManager {
        &self.lifecycle
    }

    pub fn hashes(&self) -> &HashIndexStore {
        &self.hashes
    }
}

/// `Gateway` driven from synchronous host callbacks
///
/// Owns a multi-thread runtime; must not be used from inside another tokio
/// runtime.
pub struct BlockingGateway {
    runtime: tokio::runtime::Runtime,
    gateway: Gateway,
}

impl BlockingGateway {
    /// Wrap `gateway` with a pool of `worker_threads` workers
    pub fn new(gateway: Gateway, worker_threads: usize) -> GateResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("bundlegate-worker")
            .enable_all()
            .build()
            .map_err(|e| GateError::io("starting gateway runtime", e))?;
        Ok(Self { runtime, gateway })
    }

    pub fn from_config(config: &Config) -> GateResult<Self> {
        Self::new(Gateway::from_config(config), config.cache.worker_threads)
    }

    pub fn initialize(&self) -> GateResult<Initialized> {
        self.runtime.block_on(self.gateway.initialize())
    }

    /// Serve one request, blocking the calling thread until it completes
    pub fn intercept(&self, path: &str, query: Option<&str>) -> InterceptResponse {
        self.runtime.block_on(self.gateway.intercept(path, query))
    }

    pub fn should_intercept(&self, path: &str) -> bool {
        self.gateway.should_intercept(path)
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{manifest_for, MemoryTransport, StaticProbe, StaticVersionClient, TEST_ORIGIN};
    use crate::transport::HttpResponse;
    use crate::version::MemoryKeyValueStore;
    use tempfile::TempDir;

    fn gateway(dir: &TempDir, client: StaticVersionClient) -> (Gateway, Arc<MemoryTransport>) {
        let mut config = Config::default();
        config.origin.base_url = TEST_ORIGIN.to_string();
        config.cache.root = Some(dir.path().join("webview_cache"));
        config.cache.hash_root = Some(dir.path().join("hash_cache"));

        let transport = Arc::new(MemoryTransport::new());
        let gateway = Gateway::with_collaborators(
            &config,
            Collaborators {
                transport: Arc::clone(&transport) as Arc<dyn HttpTransport>,
                client: Arc::new(client),
                probe: Arc::new(StaticProbe::new(true)),
                state: Arc::new(MemoryKeyValueStore::new()),
                audit: Arc::new(AuditLog::disabled()),
            },
        );
        (gateway, transport)
    }

    #[tokio::test]
    async fn initialize_activates_namespace() {
        let dir = TempDir::new().unwrap();
        let (gateway, _) = gateway(&dir, StaticVersionClient::returning(manifest_for("v1")));

        let init = gateway.initialize().await.unwrap();
        assert_eq!(init.origin, ResolveOrigin::Fresh);
        assert_eq!(init.namespace.as_str(), "v1");
        assert_eq!(gateway.lifecycle().active().await, Some(init.namespace));
    }

    #[tokio::test]
    async fn prefix_filter() {
        let dir = TempDir::new().unwrap();
        let (gateway, _) = gateway(&dir, StaticVersionClient::empty());
        assert!(gateway.should_intercept("/build/main.js"));
        assert!(gateway.should_intercept("/assets/logo.png"));
        assert!(!gateway.should_intercept("/api/login"));
        assert!(!gateway.should_intercept("build/main.js"));
    }

    #[tokio::test]
    async fn clear_all_caches_resets_state() {
        let dir = TempDir::new().unwrap();
        let (gateway, transport) = gateway(&dir, StaticVersionClient::returning(manifest_for("v1")));
        transport.route(
            &format!("{TEST_ORIGIN}/resources/v1/www/a.js"),
            HttpResponse::ok("a"),
        );

        gateway.initialize().await.unwrap();
        assert_eq!(gateway.intercept("/a.js", None).await.status, 200);

        gateway.clear_all_caches().await.unwrap();
        let status = gateway.status().await.unwrap();
        assert!(status.active.is_none());
        assert!(status.persisted.is_none());
        assert_eq!(status.total_bytes, 0);
        assert_eq!(gateway.intercept("/a.js", None).await.status, 503);
    }

    #[tokio::test]
    async fn status_reports_usage() {
        let dir = TempDir::new().unwrap();
        let (gateway, transport) = gateway(&dir, StaticVersionClient::returning(manifest_for("v1")));
        transport.route(
            &format!("{TEST_ORIGIN}/resources/v1/www/a.js"),
            HttpResponse::ok("abcd"),
        );
        gateway.initialize().await.unwrap();
        gateway.intercept("/a.js", None).await;

        let status = gateway.status().await.unwrap();
        assert_eq!(status.namespaces.len(), 1);
        assert!(status.namespaces[0].active);
        assert_eq!(status.namespaces[0].bytes, 4);
        assert_eq!(status.persisted.unwrap().version, "v1");
    }

    #[tokio::test]
    async fn app_update_flag() {
        let dir = TempDir::new().unwrap();
        let mut manifest = manifest_for("v1");
        manifest.new_app_version = Some("999.0.0".into());
        let (gateway, _) = gateway(&dir, StaticVersionClient::returning(manifest));

        assert!(!gateway.app_update_available().await.unwrap());
        gateway.initialize().await.unwrap();
        assert!(gateway.app_update_available().await.unwrap());
    }

    #[test]
    fn blocking_gateway_serves_from_sync_code() {
        let dir = TempDir::new().unwrap();
        let (gateway, transport) = gateway(&dir, StaticVersionClient::returning(manifest_for("v1")));
        transport.route(
            &format!("{TEST_ORIGIN}/resources/v1/www/a.js"),
            HttpResponse::ok("a"),
        );

        let blocking = BlockingGateway::new(gateway, 2).unwrap();
        blocking.initialize().unwrap();
        let response = blocking.intercept("/a.js", None);
        assert_eq!(response.status, 200);
        assert_eq!(response.header("X-Cache"), Some("MISS"));
        assert!(blocking.should_intercept("/build/x.js"));
    }
}

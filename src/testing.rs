//! In-memory fakes and an isolated environment for tests
//!
//! Provides:
//! - `MemoryTransport`, a routed HTTP fake with per-URL call counters
//! - `StaticVersionClient` and `StaticProbe` for the manifest side
//! - `TestEnvironment`, wiring the cache, hash store and server over a
//!   temporary directory
//!
//! Compiled for this crate's unit tests and, outside them, only with the
//! `testing` feature.
//!
//! # Usage
//!
//! ```ignore
//! use bundlegate::testing::TestEnvironment;
//!
//! #[tokio::test]
//! async fn serves_published_file() {
//!     let env = TestEnvironment::new("v1").await;
//!     env.publish("build/main.js", b"code");
//!     let response = env.server().intercept("/build/main.js", None).await;
//!     assert_eq!(response.status, 200);
//! }
//! ```

use crate::audit::AuditLog;
use crate::cache::{CacheLifecycleManager, CacheNamespace, ResourceCache};
use crate::config::Config;
use crate::error::{GateError, GateResult};
use crate::integrity::{HashAlgorithm, HashIndex, HashIndexStore};
use crate::origin::{OriginEndpoint, OriginFallbackServer, ServerOptions};
use crate::transport::{HttpResponse, HttpTransport};
use crate::version::{
    DeviceContext, ManifestStore, MemoryKeyValueStore, NetworkProbe, RawManifestResponse,
    VersionApiClient, VersionManifest,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

/// Origin base URL used by every fake
pub const TEST_ORIGIN: &str = "http://origin.test";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Transport-level failure a route can simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Timeout,
    Unreachable,
}

#[derive(Clone)]
enum Route {
    Respond(HttpResponse),
    Fail(Failure),
}

/// Routed in-memory HTTP transport
///
/// Unrouted URLs fail as unreachable.
#[derive(Default)]
pub struct MemoryTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<HashMap<String, usize>>,
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    headers: Mutex<HashMap<String, Vec<(String, String)>>>,
    latency: Option<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer `url` with `response`, replacing any previous route
    pub fn route(&self, url: &str, response: HttpResponse) {
        lock(&self.routes).insert(url.to_string(), Route::Respond(response));
    }

    /// Fail requests for `url`
    pub fn fail(&self, url: &str, failure: Failure) {
        lock(&self.routes).insert(url.to_string(), Route::Fail(failure));
    }

    pub fn unroute(&self, url: &str) {
        lock(&self.routes).remove(url);
    }

    /// Requests seen for `url`
    pub fn calls(&self, url: &str) -> usize {
        lock(&self.calls).get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    /// Body of the last POST to `url`
    pub fn last_body(&self, url: &str) -> Option<Vec<u8>> {
        lock(&self.bodies).get(url).cloned()
    }

    /// Headers of the last request to `url`
    pub fn last_headers(&self, url: &str) -> Option<Vec<(String, String)>> {
        lock(&self.headers).get(url).cloned()
    }

    async fn respond(&self, url: &str, headers: &[(String, String)]) -> GateResult<HttpResponse> {
        *lock(&self.calls).entry(url.to_string()).or_insert(0) += 1;
        lock(&self.headers).insert(url.to_string(), headers.to_vec());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let route = lock(&self.routes).get(url).cloned();
        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(Failure::Timeout)) => Err(GateError::RequestTimeout(url.to_string())),
            Some(Route::Fail(Failure::Unreachable)) | None => Err(GateError::NetworkUnavailable(
                format!("cannot reach {}", url),
            )),
        }
    }
}

#[async_trait]
impl HttpTransport for MemoryTransport {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> GateResult<HttpResponse> {
        self.respond(url, headers).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> GateResult<HttpResponse> {
        lock(&self.bodies).insert(url.to_string(), body);
        self.respond(url, headers).await
    }
}

/// Manifest that validates against the default success code
pub fn manifest_for(namespace: &str) -> VersionManifest {
    VersionManifest {
        version: namespace.to_string(),
        resource_namespace: namespace.to_string(),
        update_flag: Some("0".to_string()),
        res_code: Some("CIP0000000".to_string()),
        res_msg: Some("success".to_string()),
        ..VersionManifest::default()
    }
}

#[derive(Clone)]
enum Outcome {
    Manifest(VersionManifest),
    Empty,
    Timeout,
    Unavailable,
}

/// Manifest client answering with a fixed outcome
pub struct StaticVersionClient {
    outcome: Mutex<Outcome>,
    latency: Option<Duration>,
    calls: Arc<AtomicUsize>,
    active: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl StaticVersionClient {
    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            latency: None,
            calls: Arc::new(AtomicUsize::new(0)),
            active: AtomicUsize::new(0),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn returning(manifest: VersionManifest) -> Self {
        Self::with_outcome(Outcome::Manifest(manifest))
    }

    pub fn empty() -> Self {
        Self::with_outcome(Outcome::Empty)
    }

    pub fn failing_timeout() -> Self {
        Self::with_outcome(Outcome::Timeout)
    }

    pub fn failing_unavailable() -> Self {
        Self::with_outcome(Outcome::Unavailable)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer later calls with `manifest`
    pub fn set_manifest(&self, manifest: VersionManifest) {
        *lock(&self.outcome) = Outcome::Manifest(manifest);
    }

    /// Make later calls time out
    pub fn set_failing(&self) {
        *lock(&self.outcome) = Outcome::Timeout;
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Highest number of overlapping calls observed
    pub fn peak_concurrency(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.peak)
    }
}

#[async_trait]
impl VersionApiClient for StaticVersionClient {
    async fn fetch_manifest(
        &self,
        _device: &DeviceContext,
    ) -> GateResult<Option<RawManifestResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = lock(&self.outcome).clone();
        self.active.fetch_sub(1, Ordering::SeqCst);
        match outcome {
            Outcome::Manifest(manifest) => Ok(Some(manifest)),
            Outcome::Empty => Ok(None),
            Outcome::Timeout => Err(GateError::RequestTimeout("manifest api".to_string())),
            Outcome::Unavailable => Err(GateError::ServerUnavailable("manifest api".to_string())),
        }
    }
}

/// Probe with a switchable answer
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkProbe for StaticProbe {
    async fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Isolated cache, hash store and origin over a temporary directory
pub struct TestEnvironment {
    _temp_dir: TempDir,
    /// Root of all on-disk state for this environment
    pub root: PathBuf,
    pub transport: Arc<MemoryTransport>,
    pub manifests: ManifestStore,
    pub lifecycle: Arc<CacheLifecycleManager>,
    pub hashes: Arc<HashIndexStore>,
    pub audit: Arc<AuditLog>,
    namespace: CacheNamespace,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl TestEnvironment {
    fn build(namespace: &str) -> Self {
        let temp_dir = TempDir::new().unwrap_or_else(|e| panic!("temp dir: {e}"));
        let root = temp_dir.path().to_path_buf();
        let transport = Arc::new(MemoryTransport::new());
        let audit = Arc::new(AuditLog::at(root.join("audit.log")));
        let lifecycle = Arc::new(CacheLifecycleManager::new(
            ResourceCache::new(root.join("webview_cache")),
            Arc::clone(&audit),
        ));
        let hashes = Arc::new(HashIndexStore::new(
            OriginEndpoint::new(TEST_ORIGIN),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            root.join("hash_cache"),
            HashAlgorithm::Md5,
            Duration::from_secs(5),
        ));

        Self {
            _temp_dir: temp_dir,
            root,
            transport,
            manifests: ManifestStore::new(Arc::new(MemoryKeyValueStore::new())),
            lifecycle,
            hashes,
            audit,
            namespace: CacheNamespace::new(namespace)
                .unwrap_or_else(|e| panic!("bad namespace: {e}")),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Environment with `namespace` persisted and active
    pub async fn new(namespace: &str) -> Self {
        let env = Self::persisted_only(namespace).await;
        env.lifecycle
            .activate(&env.namespace)
            .await
            .unwrap_or_else(|e| panic!("activate: {e}"));
        env
    }

    /// Environment with `namespace` persisted but nothing active yet
    pub async fn persisted_only(namespace: &str) -> Self {
        let env = Self::build(namespace);
        env.manifests
            .save(&manifest_for(namespace))
            .await
            .unwrap_or_else(|e| panic!("persist manifest: {e}"));
        env
    }

    /// Environment with no manifest at all
    pub async fn uninitialized() -> Self {
        Self::build("unset")
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace.clone()
    }

    pub fn cache(&self) -> &ResourceCache {
        self.lifecycle.cache()
    }

    pub fn resource_url(&self, relative: &str) -> String {
        OriginEndpoint::new(TEST_ORIGIN).resource_url(&self.namespace, relative, None)
    }

    pub fn hashes_url(&self) -> String {
        OriginEndpoint::new(TEST_ORIGIN).hash_manifest_url(&self.namespace)
    }

    /// Serve `content` at `relative` and list it in the hash manifest
    pub fn publish(&self, relative: &str, content: &[u8]) {
        let mut published = lock(&self.published);
        published.retain(|(path, _)| path != relative);
        published.push((relative.to_string(), content.to_vec()));

        let index = HashIndex::from_contents(
            HashAlgorithm::Md5,
            published.iter().map(|(p, c)| (p.as_str(), c.as_slice())),
        );
        let doc = index
            .to_json()
            .unwrap_or_else(|e| panic!("hash manifest: {e}"));
        self.transport.route(&self.hashes_url(), HttpResponse::ok(doc));
        self.transport
            .route(&self.resource_url(relative), HttpResponse::ok(content.to_vec()));
    }

    /// Serve `content` at `relative` without updating the hash manifest
    pub fn tamper(&self, relative: &str, content: &[u8]) {
        self.transport
            .route(&self.resource_url(relative), HttpResponse::ok(content.to_vec()));
    }

    pub fn server(&self) -> OriginFallbackServer {
        self.server_with(ServerOptions::default())
    }

    pub fn server_with(&self, options: ServerOptions) -> OriginFallbackServer {
        OriginFallbackServer::new(
            Arc::clone(&self.lifecycle),
            Arc::clone(&self.hashes),
            self.manifests.clone(),
            OriginEndpoint::new(TEST_ORIGIN),
            Arc::clone(&self.transport) as Arc<dyn HttpTransport>,
            options,
            Arc::clone(&self.audit),
        )
    }

    /// Config pointing every path and URL into this environment
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.origin.base_url = TEST_ORIGIN.to_string();
        config.cache.root = Some(self.root.join("webview_cache"));
        config.cache.hash_root = Some(self.root.join("hash_cache"));
        config
    }

    /// Names of audit events written so far, in order
    pub fn audit_events(&self) -> Vec<String> {
        let content = std::fs::read_to_string(self.audit.path()).unwrap_or_default();
        content
            .lines()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter_map(|v| v["event"].as_str().map(str::to_string))
            .collect()
    }
}

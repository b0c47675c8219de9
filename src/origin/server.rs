//! Request interception state machine
//!
//! ```text
//! ResolveNamespace -> CheckCache -> VerifyCached -> ServeCached
//!                          |              |
//!                          +--- miss -----+--- mismatch (entry deleted)
//!                                         v
//!                                    FetchOrigin -> VerifyFetched -> ServeFresh
//!                                                        |
//!                                                        +--> Fail
//! ```
//!
//! Every failure is turned into an error response at the boundary; callers
//! never see a `GateError` from `intercept`.

use crate::audit::{self, AuditLog};
use crate::cache::{normalize_relative, CacheLifecycleManager, CacheNamespace, NamespaceKey};
use crate::error::{GateError, GateResult};
use crate::integrity::{HashIndexStore, Integrity, Verification};
use crate::origin::mime::{mime_for_path, parse_content_type};
use crate::origin::response::{CacheStatus, InterceptResponse};
use crate::origin::OriginEndpoint;
use crate::transport::{HttpResponse, HttpTransport};
use crate::version::ManifestStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Origin headers that describe the transfer rather than the resource
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "content-encoding",
    "keep-alive",
    "transfer-encoding",
    "content-type",
];

/// Cached bytes are immutable per namespace, so hits may be cached forever
const HIT_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Interception options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub namespace_key: NamespaceKey,
    pub timeout: Duration,
    pub default_charset: String,
    pub require_listed: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            namespace_key: NamespaceKey::ResourcePath,
            timeout: Duration::from_secs(30),
            default_charset: "UTF-8".to_string(),
            require_listed: false,
        }
    }
}

pub struct OriginFallbackServer {
    lifecycle: Arc<CacheLifecycleManager>,
    hashes: Arc<HashIndexStore>,
    manifests: ManifestStore,
    endpoint: OriginEndpoint,
    transport: Arc<dyn HttpTransport>,
    options: ServerOptions,
    audit: Arc<AuditLog>,
}

impl OriginFallbackServer {
    pub fn new(
        lifecycle: Arc<CacheLifecycleManager>,
        hashes: Arc<HashIndexStore>,
        manifests: ManifestStore,
        endpoint: OriginEndpoint,
        transport: Arc<dyn HttpTransport>,
        options: ServerOptions,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            lifecycle,
            hashes,
            manifests,
            endpoint,
            transport,
            options,
            audit,
        }
    }

    /// Serve one intercepted request
    pub async fn intercept(&self, path: &str, query: Option<&str>) -> InterceptResponse {
        let mut namespace = None;
        match self.serve(path, query, &mut namespace).await {
            Ok(response) => response,
            Err(err) => {
                warn!("Request for {} failed: {}", path, err);
                InterceptResponse::error(&err, path, namespace.as_ref())
            }
        }
    }

    async fn serve(
        &self,
        path: &str,
        query: Option<&str>,
        namespace_out: &mut Option<CacheNamespace>,
    ) -> GateResult<InterceptResponse> {
        if path.trim().is_empty() {
            return Err(GateError::path_rejected(path, "invalid path"));
        }
        let relative = normalize_relative(path)?;
        let namespace = self.resolve_namespace().await?;
        *namespace_out = Some(namespace.clone());

        let request = Request {
            requested: path,
            relative: &relative,
        };
        if let Some(response) = self.serve_cached(&namespace, &request).await? {
            return Ok(response);
        }

        self.serve_fresh(&namespace, &request, query).await
    }

    /// Active namespace, activating the persisted one on first use
    async fn resolve_namespace(&self) -> GateResult<CacheNamespace> {
        if let Some(active) = self.lifecycle.active().await {
            return Ok(active);
        }

        let manifest = self
            .manifests
            .load()
            .await?
            .ok_or(GateError::NamespaceUninitialized)?;
        let namespace = manifest
            .namespace(self.options.namespace_key)
            .map_err(|_| GateError::NamespaceUninitialized)?;
        self.lifecycle.activate(&namespace).await?;
        info!("Restored namespace {} from persisted manifest", namespace);
        Ok(namespace)
    }

    async fn serve_cached(
        &self,
        namespace: &CacheNamespace,
        request: &Request<'_>,
    ) -> GateResult<Option<InterceptResponse>> {
        let relative = request.relative;
        let cache = self.lifecycle.cache();
        let data = match cache.get(namespace, relative).await {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Cache read for {} failed, treating as miss: {}", relative, e);
                return Ok(None);
            }
        };

        let verification = self.verify(namespace, request, &data).await.verification;
        match verification.status {
            Integrity::Failed => {
                warn!(
                    "Cached {} in {} failed verification, refetching",
                    relative, namespace
                );
                if let Err(e) = cache.delete(namespace, relative).await {
                    warn!("Could not delete corrupt entry {}: {}", relative, e);
                }
                self.audit
                    .log(
                        audit::ENTRY_EVICTED,
                        &serde_json::json!({
                            "namespace": namespace,
                            "path": relative,
                            "expected": verification.expected,
                            "actual": verification.actual,
                        }),
                    )
                    .await;
                Ok(None)
            }
            Integrity::Unverified if self.options.require_listed => {
                Err(unlisted(relative, verification))
            }
            status => {
                debug!("HIT {} ({})", relative, status);
                let mut response = InterceptResponse::resource(
                    data,
                    mime_for_path(relative),
                    self.options.default_charset.clone(),
                    CacheStatus::Hit,
                    status,
                    namespace,
                );
                response.set_header("Cache-Control", HIT_CACHE_CONTROL);
                Ok(Some(response))
            }
        }
    }

    async fn serve_fresh(
        &self,
        namespace: &CacheNamespace,
        request: &Request<'_>,
        query: Option<&str>,
    ) -> GateResult<InterceptResponse> {
        let relative = request.relative;
        let origin = self.fetch(namespace, relative, query).await?;

        let Checked {
            verification,
            persist,
        } = self.verify(namespace, request, &origin.body).await;
        match verification.status {
            Integrity::Failed => {
                let expected = verification.expected.unwrap_or_default();
                warn!(
                    "Origin bytes for {} in {} do not match the hash manifest",
                    relative, namespace
                );
                self.audit
                    .log(
                        audit::INTEGRITY_MISMATCH,
                        &serde_json::json!({
                            "namespace": namespace,
                            "path": relative,
                            "expected": expected,
                            "actual": verification.actual,
                        }),
                    )
                    .await;
                return Err(GateError::IntegrityMismatch {
                    path: relative.to_string(),
                    expected,
                    actual: verification.actual,
                });
            }
            Integrity::Unverified if self.options.require_listed => {
                return Err(unlisted(relative, verification));
            }
            _ => {}
        }

        if !persist {
            debug!(
                "Not caching {} until the hash manifest for {} can be loaded",
                relative, namespace
            );
        } else if !origin.body.is_empty() {
            if let Err(e) = self
                .lifecycle
                .cache()
                .put(namespace, relative, &origin.body)
                .await
            {
                warn!("{} ({})", e, e.kind());
            }
        }

        let (origin_mime, origin_charset) = origin
            .header("Content-Type")
            .map(parse_content_type)
            .unwrap_or((None, None));
        let mime = origin_mime.unwrap_or_else(|| mime_for_path(relative).to_string());
        let charset = origin_charset.unwrap_or_else(|| self.options.default_charset.clone());

        let mut response = InterceptResponse::resource(
            Vec::new(),
            mime,
            charset,
            CacheStatus::Miss,
            verification.status,
            namespace,
        );
        for (name, value) in &origin.headers {
            let lower = name.to_ascii_lowercase();
            if HOP_BY_HOP.contains(&lower.as_str())
                || lower.starts_with("x-cache")
                || lower == "x-integrity"
                || lower == "x-resource-path"
            {
                continue;
            }
            response.headers.push((name.clone(), value.clone()));
        }
        response.body = origin.body;

        debug!("MISS {} ({})", relative, verification.status);
        Ok(response)
    }

    async fn fetch(
        &self,
        namespace: &CacheNamespace,
        relative: &str,
        query: Option<&str>,
    ) -> GateResult<HttpResponse> {
        let url = self.endpoint.resource_url(namespace, relative, query);
        debug!("Fetching {}", url);

        let response = tokio::time::timeout(
            self.options.timeout,
            self.transport.get(&url, self.endpoint.headers()),
        )
        .await
        .map_err(|_| GateError::RequestTimeout(url.clone()))??;

        match response.status {
            200 => Ok(response),
            408 | 504 => Err(GateError::RequestTimeout(url)),
            503 => Err(GateError::ServerUnavailable(url)),
            status => Err(GateError::OriginStatus { status, url }),
        }
    }

    /// Check `data` against the namespace index
    ///
    /// A namespace the origin publishes no manifest for counts as having no
    /// entry. Any other load failure leaves the bytes unverified and not
    /// cacheable, so nothing unchecked outlives the outage.
    async fn verify(
        &self,
        namespace: &CacheNamespace,
        request: &Request<'_>,
        data: &[u8],
    ) -> Checked {
        match self.hashes.load_for(namespace).await {
            Ok(index) => Checked {
                verification: index.verify_request(request.requested, request.relative, data),
                persist: true,
            },
            Err(e) => {
                warn!(
                    "Hash manifest for {} unavailable ({}), serving unverified",
                    namespace,
                    e.kind()
                );
                Checked {
                    verification: Verification {
                        status: Integrity::Unverified,
                        expected: None,
                        actual: self.hashes.algorithm().hex_digest(data),
                    },
                    persist: e.is_absence(),
                }
            }
        }
    }
}

/// An intercepted path, as requested and after normalization
struct Request<'a> {
    requested: &'a str,
    relative: &'a str,
}

/// Verification outcome plus whether the bytes may be written to the cache
struct Checked {
    verification: Verification,
    persist: bool,
}

fn unlisted(relative: &str, verification: Verification) -> GateError {
    GateError::IntegrityMismatch {
        path: relative.to_string(),
        expected: "<unlisted>".to_string(),
        actual: verification.actual,
    }
}

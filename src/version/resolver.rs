//! Manifest resolution with last-known-good fallback

use crate::audit::{self, AuditLog};
use crate::error::{GateError, GateResult};
use crate::version::client::VersionApiClient;
use crate::version::manifest::{DeviceContext, VersionManifest};
use crate::version::probe::NetworkProbe;
use crate::version::store::ManifestStore;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Where a resolved manifest came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOrigin {
    /// Fetched and validated just now
    Fresh,
    /// The persisted manifest, served because the fetch failed
    CachedFallback,
}

impl fmt::Display for ResolveOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::CachedFallback => write!(f, "cached fallback"),
        }
    }
}

pub struct VersionResolver {
    client: Arc<dyn VersionApiClient>,
    probe: Arc<dyn NetworkProbe>,
    store: ManifestStore,
    device: DeviceContext,
    success_code: String,
    audit: Arc<AuditLog>,
    // tokio's Mutex grants the lock in request order
    queue: Mutex<()>,
}

impl VersionResolver {
    pub fn new(
        client: Arc<dyn VersionApiClient>,
        probe: Arc<dyn NetworkProbe>,
        store: ManifestStore,
        device: DeviceContext,
        success_code: impl Into<String>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            client,
            probe,
            store,
            device,
            success_code: success_code.into(),
            audit,
            queue: Mutex::new(()),
        }
    }

    /// Obtain the current manifest
    ///
    /// Calls are served one at a time in arrival order, each running the
    /// whole fetch-validate-persist sequence before the next starts.
    pub async fn resolve(&self) -> GateResult<(VersionManifest, ResolveOrigin)> {
        let _turn = self.queue.lock().await;

        if !self.probe.is_reachable().await {
            return self
                .fallback(GateError::NetworkUnavailable(
                    "origin is not reachable".to_string(),
                ))
                .await;
        }

        match self.fetch_fresh().await {
            Ok(manifest) => {
                if let Err(e) = self.store.save(&manifest).await {
                    warn!("Resolved manifest could not be persisted: {}", e);
                }
                info!(
                    "Resolved manifest {} ({})",
                    manifest.version, manifest.resource_namespace
                );
                Ok((manifest, ResolveOrigin::Fresh))
            }
            Err(e) => self.fallback(e).await,
        }
    }

    /// Last persisted manifest, without network access
    pub async fn persisted(&self) -> GateResult<Option<VersionManifest>> {
        self.store.load().await
    }

    /// Wipe persisted manifest state
    pub async fn clear(&self) -> GateResult<()> {
        let _turn = self.queue.lock().await;
        self.store.clear().await
    }

    async fn fetch_fresh(&self) -> GateResult<VersionManifest> {
        let manifest = self
            .client
            .fetch_manifest(&self.device)
            .await?
            .ok_or(GateError::ApiResponseNull)?;
        manifest.validate(&self.success_code)?;
        Ok(manifest)
    }

    async fn fallback(&self, cause: GateError) -> GateResult<(VersionManifest, ResolveOrigin)> {
        let persisted = match self.store.load().await {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!("Cannot read persisted manifest: {}", e);
                None
            }
        };

        let Some(manifest) = persisted else {
            return Err(cause);
        };

        warn!(
            "Manifest fetch failed ({}), using persisted version {}",
            cause.kind(),
            manifest.version
        );
        self.audit
            .log(
                audit::MANIFEST_FALLBACK,
                &serde_json::json!({
                    "cause": cause.kind(),
                    "message": cause.to_string(),
                    "version": manifest.version,
                    "namespace": manifest.resource_namespace,
                }),
            )
            .await;
        Ok((manifest, ResolveOrigin::CachedFallback))
    }
}

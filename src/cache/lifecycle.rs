//! Namespace activation and eviction
//!
//! Exactly one namespace is active at a time. Activating creates its
//! directory; evicting removes the subtree and clears the active pointer if
//! it pointed there.

use crate::audit::{self, AuditLog};
use crate::cache::namespace::CacheNamespace;
use crate::cache::store::ResourceCache;
use crate::error::{GateError, GateResult};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::info;

pub struct CacheLifecycleManager {
    cache: ResourceCache,
    active: RwLock<Option<CacheNamespace>>,
    audit: Arc<AuditLog>,
}

impl CacheLifecycleManager {
    pub fn new(cache: ResourceCache, audit: Arc<AuditLog>) -> Self {
        Self {
            cache,
            active: RwLock::new(None),
            audit,
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Currently active namespace, if any
    pub async fn active(&self) -> Option<CacheNamespace> {
        self.active.read().await.clone()
    }

    /// Make `namespace` active, creating its directory
    ///
    /// Re-activating the current namespace is a no-op apart from making sure
    /// the directory still exists; cached entries are kept either way.
    pub async fn activate(&self, namespace: &CacheNamespace) -> GateResult<()> {
        let dir = self.cache.namespace_dir(namespace);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| GateError::io(format!("creating {}", dir.display()), e))?;

        let mut active = self.active.write().await;
        if active.as_ref() == Some(namespace) {
            return Ok(());
        }
        let previous = active.replace(namespace.clone());
        drop(active);

        info!("Activated cache namespace {}", namespace);
        self.audit
            .log(
                audit::NAMESPACE_ACTIVATED,
                &serde_json::json!({
                    "namespace": namespace,
                    "previous": previous,
                }),
            )
            .await;
        Ok(())
    }

    /// Remove one namespace from disk
    pub async fn evict(&self, namespace: &CacheNamespace) -> GateResult<bool> {
        let removed = self.cache.delete_namespace(namespace).await?;

        let was_active = {
            let mut active = self.active.write().await;
            if active.as_ref() == Some(namespace) {
                *active = None;
                true
            } else {
                false
            }
        };

        if removed || was_active {
            info!("Evicted cache namespace {}", namespace);
            self.audit
                .log(
                    audit::NAMESPACE_EVICTED,
                    &serde_json::json!({
                        "namespace": namespace,
                        "was_active": was_active,
                    }),
                )
                .await;
        }
        Ok(removed)
    }

    /// Remove every namespace and clear the active pointer
    pub async fn evict_all(&self) -> GateResult<()> {
        self.cache.clear_all().await?;
        *self.active.write().await = None;

        info!("Cleared all cache namespaces");
        self.audit
            .log(
                audit::CACHE_CLEARED,
                &serde_json::json!({ "root": self.cache.root() }),
            )
            .await;
        Ok(())
    }

    pub async fn list_namespaces(&self) -> GateResult<Vec<CacheNamespace>> {
        self.cache.list_namespaces().await
    }

    pub async fn size_of(&self, namespace: &CacheNamespace) -> GateResult<u64> {
        self.cache.size_of(namespace).await
    }

    pub async fn total_size(&self) -> GateResult<u64> {
        self.cache.total_size().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> CacheLifecycleManager {
        CacheLifecycleManager::new(
            ResourceCache::new(dir.path().join("cache")),
            Arc::new(AuditLog::at(dir.path().join("audit.log"))),
        )
    }

    #[tokio::test]
    async fn activate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let lifecycle = manager(&dir);
        let ns = CacheNamespace::new("v1").unwrap();

        lifecycle.activate(&ns).await.unwrap();
        lifecycle.cache().put(&ns, "a.js", b"a").await.unwrap();
        lifecycle.activate(&ns).await.unwrap();

        assert_eq!(lifecycle.active().await, Some(ns.clone()));
        assert_eq!(lifecycle.list_namespaces().await.unwrap(), vec![ns.clone()]);
        assert!(lifecycle.cache().contains(&ns, "a.js").await);

        let audit = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert_eq!(audit.lines().count(), 1);
    }

    #[tokio::test]
    async fn switching_keeps_old_namespace_on_disk() {
        let dir = TempDir::new().unwrap();
        let lifecycle = manager(&dir);
        let v1 = CacheNamespace::new("v1").unwrap();
        let v2 = CacheNamespace::new("v2").unwrap();

        lifecycle.activate(&v1).await.unwrap();
        lifecycle.activate(&v2).await.unwrap();

        assert_eq!(lifecycle.active().await, Some(v2));
        assert_eq!(lifecycle.list_namespaces().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn evict_clears_matching_pointer() {
        let dir = TempDir::new().unwrap();
        let lifecycle = manager(&dir);
        let v1 = CacheNamespace::new("v1").unwrap();
        let v2 = CacheNamespace::new("v2").unwrap();

        lifecycle.activate(&v1).await.unwrap();
        lifecycle.cache().put(&v1, "a.js", b"a").await.unwrap();
        lifecycle.activate(&v2).await.unwrap();

        assert!(lifecycle.evict(&v1).await.unwrap());
        assert_eq!(lifecycle.active().await, Some(v2.clone()));
        assert!(lifecycle.cache().get(&v1, "a.js").await.unwrap().is_none());

        lifecycle.evict(&v2).await.unwrap();
        assert_eq!(lifecycle.active().await, None);
    }

    #[tokio::test]
    async fn evict_all_resets_everything() {
        let dir = TempDir::new().unwrap();
        let lifecycle = manager(&dir);
        let v1 = CacheNamespace::new("v1").unwrap();
        lifecycle.activate(&v1).await.unwrap();
        lifecycle.cache().put(&v1, "a.js", b"abc").await.unwrap();
        assert_eq!(lifecycle.total_size().await.unwrap(), 3);

        lifecycle.evict_all().await.unwrap();
        assert_eq!(lifecycle.active().await, None);
        assert_eq!(lifecycle.total_size().await.unwrap(), 0);
    }
}

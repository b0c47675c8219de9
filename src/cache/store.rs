//! Namespace-scoped resource byte store
//!
//! Layout is `<root>/<namespace>/<relative path>`. Entries are only ever
//! written through `write_atomic`, so a reader never observes a partial
//! file; zero-length files left by other tools are treated as absent.

use crate::cache::atomic::write_atomic;
use crate::cache::namespace::{normalize_relative, CacheNamespace};
use crate::error::{GateError, GateResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// On-disk resource cache
#[derive(Debug, Clone)]
pub struct ResourceCache {
    root: PathBuf,
}

impl ResourceCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing a namespace
    pub fn namespace_dir(&self, namespace: &CacheNamespace) -> PathBuf {
        namespace.dir_in(&self.root)
    }

    /// File backing one entry, after path normalization
    pub fn entry_path(&self, namespace: &CacheNamespace, relative: &str) -> GateResult<PathBuf> {
        let relative = normalize_relative(relative)?;
        Ok(relative
            .split('/')
            .fold(self.namespace_dir(namespace), |p, s| p.join(s)))
    }

    /// Read an entry; missing and zero-length files are `None`
    pub async fn get(
        &self,
        namespace: &CacheNamespace,
        relative: &str,
    ) -> GateResult<Option<Vec<u8>>> {
        let path = self.entry_path(namespace, relative)?;
        match fs::read(&path).await {
            Ok(data) if data.is_empty() => Ok(None),
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GateError::io(format!("reading {}", path.display()), e)),
        }
    }

    /// Store an entry, replacing any previous bytes
    pub async fn put(&self, namespace: &CacheNamespace, relative: &str, data: &[u8]) -> GateResult<()> {
        let path = self.entry_path(namespace, relative)?;
        if data.is_empty() {
            return Err(GateError::CacheWriteFailed {
                path: relative.to_string(),
                reason: "refusing to cache an empty payload".to_string(),
            });
        }

        write_atomic(&path, data.to_vec())
            .await
            .map_err(|e| GateError::CacheWriteFailed {
                path: relative.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Cached {} bytes at {}", data.len(), path.display());
        Ok(())
    }

    /// True when a non-empty entry exists
    pub async fn contains(&self, namespace: &CacheNamespace, relative: &str) -> bool {
        let Ok(path) = self.entry_path(namespace, relative) else {
            return false;
        };
        fs::metadata(&path)
            .await
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Delete one entry and any directories it leaves empty
    ///
    /// Returns whether an entry existed. The namespace directory itself is
    /// never removed here.
    pub async fn delete(&self, namespace: &CacheNamespace, relative: &str) -> GateResult<bool> {
        let path = self.entry_path(namespace, relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(GateError::io(format!("deleting {}", path.display()), e)),
        }

        prune_empty_parents(&path, &self.namespace_dir(namespace)).await;
        Ok(true)
    }

    /// Remove a namespace subtree; returns whether it existed
    pub async fn delete_namespace(&self, namespace: &CacheNamespace) -> GateResult<bool> {
        let dir = self.namespace_dir(namespace);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                prune_empty_parents(&dir, &self.root).await;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(GateError::io(format!("removing {}", dir.display()), e)),
        }
    }

    /// Remove every namespace, leaving an empty root
    pub async fn clear_all(&self) -> GateResult<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(GateError::io(
                    format!("clearing {}", self.root.display()),
                    e,
                ))
            }
        }
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| GateError::io(format!("creating {}", self.root.display()), e))
    }

    /// Bytes stored under one namespace
    pub async fn size_of(&self, namespace: &CacheNamespace) -> GateResult<u64> {
        dir_size(self.namespace_dir(namespace)).await
    }

    /// Bytes stored under the whole root
    pub async fn total_size(&self) -> GateResult<u64> {
        dir_size(self.root.clone()).await
    }

    /// Top-level namespace directories present on disk, sorted
    pub async fn list_namespaces(&self) -> GateResult<Vec<CacheNamespace>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GateError::io(
                    format!("listing {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut namespaces = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| GateError::io(format!("listing {}", self.root.display()), e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(ns) = CacheNamespace::new(name) {
                    namespaces.push(ns);
                }
            }
        }
        namespaces.sort();
        Ok(namespaces)
    }
}

/// Remove empty directories from `path`'s parent upwards, stopping before `stop`
async fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        // remove_dir fails on non-empty directories, which ends the walk
        if fs::remove_dir(dir).await.is_err() {
            break;
        }
        current = dir.parent();
    }
}

async fn dir_size(dir: PathBuf) -> GateResult<u64> {
    tokio::task::spawn_blocking(move || walk_size(&dir))
        .await
        .map_err(|e| GateError::Internal(format!("size task failed: {}", e)))?
}

fn walk_size(dir: &Path) -> GateResult<u64> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(GateError::io(format!("reading {}", dir.display()), e)),
    };

    let mut total = 0;
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            total += walk_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache() -> (TempDir, ResourceCache, CacheNamespace) {
        let dir = TempDir::new().unwrap();
        let cache = ResourceCache::new(dir.path().join("webview_cache"));
        (dir, cache, CacheNamespace::new("v1").unwrap())
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_dir, cache, ns) = cache();
        cache.put(&ns, "/build/main.js", b"code").await.unwrap();

        assert_eq!(cache.get(&ns, "build/main.js").await.unwrap().unwrap(), b"code");
        assert!(cache.contains(&ns, "/build/main.js").await);
    }

    #[tokio::test]
    async fn zero_length_file_is_absent() {
        let (_dir, cache, ns) = cache();
        let path = cache.entry_path(&ns, "a.css").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"").unwrap();

        assert!(cache.get(&ns, "a.css").await.unwrap().is_none());
        assert!(!cache.contains(&ns, "a.css").await);
    }

    #[tokio::test]
    async fn empty_payload_rejected() {
        let (_dir, cache, ns) = cache();
        let err = cache.put(&ns, "a.js", b"").await.unwrap_err();
        assert!(matches!(err, GateError::CacheWriteFailed { .. }));
        assert!(!cache.entry_path(&ns, "a.js").unwrap().exists());
    }

    #[tokio::test]
    async fn traversal_rejected_before_io() {
        let (dir, cache, ns) = cache();
        let err = cache.put(&ns, "../../escape.js", b"x").await.unwrap_err();
        assert!(matches!(err, GateError::PathRejected { .. }));
        assert!(!dir.path().join("escape.js").exists());
        assert!(cache.get(&ns, "/build/../../x").await.is_err());
    }

    #[tokio::test]
    async fn delete_prunes_up_to_namespace_root() {
        let (_dir, cache, ns) = cache();
        cache.put(&ns, "build/js/deep/app.js", b"x").await.unwrap();

        assert!(cache.delete(&ns, "build/js/deep/app.js").await.unwrap());
        assert!(!cache.namespace_dir(&ns).join("build").exists());
        assert!(cache.namespace_dir(&ns).exists());
        assert!(!cache.delete(&ns, "build/js/deep/app.js").await.unwrap());
    }

    #[tokio::test]
    async fn delete_keeps_non_empty_siblings() {
        let (_dir, cache, ns) = cache();
        cache.put(&ns, "build/a.js", b"a").await.unwrap();
        cache.put(&ns, "build/b.js", b"b").await.unwrap();

        cache.delete(&ns, "build/a.js").await.unwrap();
        assert!(cache.contains(&ns, "build/b.js").await);
    }

    #[tokio::test]
    async fn namespaces_sizes_and_clear() {
        let (_dir, cache, v1) = cache();
        let v2 = CacheNamespace::new("v2").unwrap();
        cache.put(&v1, "a.js", b"1234").await.unwrap();
        cache.put(&v2, "b.js", b"12").await.unwrap();

        assert_eq!(cache.list_namespaces().await.unwrap(), vec![v1.clone(), v2.clone()]);
        assert_eq!(cache.size_of(&v1).await.unwrap(), 4);
        assert_eq!(cache.total_size().await.unwrap(), 6);

        assert!(cache.delete_namespace(&v1).await.unwrap());
        assert!(cache.get(&v1, "a.js").await.unwrap().is_none());
        assert!(!cache.delete_namespace(&v1).await.unwrap());

        cache.clear_all().await.unwrap();
        assert!(cache.list_namespaces().await.unwrap().is_empty());
        assert!(cache.root().exists());
    }

    #[tokio::test]
    async fn nested_namespace_removal_prunes_parent() {
        let (_dir, cache, _) = cache();
        let ns = CacheNamespace::new("h5/v3").unwrap();
        cache.put(&ns, "index.html", b"<html>").await.unwrap();

        cache.delete_namespace(&ns).await.unwrap();
        assert!(!cache.root().join("h5").exists());
        assert!(cache.root().exists());
    }
}

//! Audit logging for integrity and cache lifecycle events
//!
//! Writes JSON lines to `<state dir>/bundlegate/audit.log`. Enabled by
//! default; `general.audit_log = false` turns it off.

use crate::config::{schema::Config, ConfigManager};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Served bytes did not match the hash manifest
pub const INTEGRITY_MISMATCH: &str = "integrity.mismatch";
/// A cached entry was dropped after failing verification
pub const ENTRY_EVICTED: &str = "cache.entry_evicted";
pub const NAMESPACE_ACTIVATED: &str = "namespace.activated";
pub const NAMESPACE_EVICTED: &str = "namespace.evicted";
/// Resolution served the persisted manifest instead of a fresh one
pub const MANIFEST_FALLBACK: &str = "manifest.fallback";
pub const CACHE_CLEARED: &str = "cache.cleared";

/// File-based audit logger that appends JSON lines
#[derive(Debug, Clone)]
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    /// Create a new audit logger from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.audit_log,
            path: ConfigManager::audit_log_path(),
        }
    }

    /// Audit logger writing to an explicit file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            path: path.into(),
        }
    }

    /// Audit logger that drops every event
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append one event
    ///
    /// IO failures are reported through tracing and otherwise ignored; an
    /// audit write never fails the request that triggered it.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let record = AuditRecord {
            timestamp: Utc::now(),
            event,
            data,
        };
        let line = match serde_json::to_vec(&record) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                bytes
            }
            Err(e) => {
                warn!("Dropping unserializable audit event {}: {}", event, e);
                return;
            }
        };

        if let Err(e) = self.append(&line).await {
            warn!("Audit log {} not writable: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line).await?;
        file.flush().await
    }
}

/// One line of the audit log
#[derive(Serialize)]
struct AuditRecord<'a> {
    timestamp: DateTime<Utc>,
    event: &'a str,
    data: &'a serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_json_line() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::at(dir.path().join("audit.log"));

        audit
            .log(
                INTEGRITY_MISMATCH,
                &serde_json::json!({"namespace": "v1", "path": "build/main.js"}),
            )
            .await;

        let content = tokio::fs::read_to_string(audit.path()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();

        assert_eq!(parsed["event"], "integrity.mismatch");
        assert_eq!(parsed["data"]["path"], "build/main.js");
        assert!(parsed["timestamp"].is_string());
    }

    #[tokio::test]
    async fn appends_multiple_lines() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::at(dir.path().join("nested/audit.log"));

        audit.log(NAMESPACE_ACTIVATED, &serde_json::json!({})).await;
        audit.log(NAMESPACE_EVICTED, &serde_json::json!({})).await;

        let content = tokio::fs::read_to_string(audit.path()).await.unwrap();
        assert_eq!(content.trim().lines().count(), 2);
    }

    #[tokio::test]
    async fn skips_when_disabled() {
        let audit = AuditLog::disabled();
        audit.log("should.not.appear", &serde_json::json!({})).await;
        assert!(!audit.path().exists());
    }
}

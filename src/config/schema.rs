//! Configuration schema for bundlegate
//!
//! Configuration is stored at `~/.config/bundlegate/config.toml`

use crate::cache::NamespaceKey;
use crate::integrity::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Resource origin settings
    pub origin: OriginConfig,

    /// Version manifest API settings
    pub api: ApiConfig,

    /// On-disk cache settings
    pub cache: CacheConfig,

    /// Integrity verification settings
    pub integrity: IntegrityConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Resource origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Origin base URL; resources live under `{base_url}/resources/{namespace}`
    pub base_url: String,

    /// User-Agent sent with every origin request
    pub user_agent: String,

    /// Extra headers sent with every origin request
    pub headers: BTreeMap<String, String>,

    /// Request path prefixes routed through the gateway
    pub intercept_prefixes: Vec<String>,

    /// Timeout for resource fetches
    pub request_timeout_secs: u64,

    /// Timeout for hash manifest fetches
    pub hash_timeout_secs: u64,

    /// Charset reported when the origin does not declare one
    pub default_charset: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("X-Custom-Header".to_string(), "CustomValue".to_string());
        Self {
            base_url: "http://127.0.0.1:8100".to_string(),
            user_agent: "Mozilla/5.0 (Android; WebView)".to_string(),
            headers,
            intercept_prefixes: vec!["/build/".to_string(), "/assets/".to_string()],
            request_timeout_secs: 30,
            hash_timeout_secs: 30,
            default_charset: "UTF-8".to_string(),
        }
    }
}

impl OriginConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn hash_timeout(&self) -> Duration {
        Duration::from_secs(self.hash_timeout_secs)
    }
}

/// Version manifest API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API operation name, posted to `{base_url}/NCB/{api_name}`
    pub api_name: String,

    /// Business code that marks a successful response
    pub success_code: String,

    /// Timeout for the manifest call
    pub timeout_secs: u64,

    /// Channel number reported to the API
    pub channel_no: String,

    /// Host application version reported to the API
    pub app_version: String,

    /// Device identifier reported to the API
    pub device_code: String,

    /// Terminal IP reported to the API
    pub term_ip: String,

    /// Operator number reported to the API
    pub oper_no: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_name: "mAppVersionQuery".to_string(),
            success_code: "CIP0000000".to_string(),
            timeout_secs: 30,
            channel_no: "mb".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            device_code: String::new(),
            term_ip: "127.0.0.1".to_string(),
            oper_no: String::new(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Resource cache root (default: `<data dir>/bundlegate/webview_cache`)
    pub root: Option<PathBuf>,

    /// Hash manifest cache root (default: `<data dir>/bundlegate/hash_cache`)
    pub hash_root: Option<PathBuf>,

    /// Which manifest field names the cache namespace
    pub namespace_key: NamespaceKey,

    /// Worker threads used by the blocking host adapter
    pub worker_threads: usize,

    /// Largest response body accepted from the origin, in MB
    pub max_body_mb: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            hash_root: None,
            namespace_key: NamespaceKey::ResourcePath,
            worker_threads: 4,
            max_body_mb: 64,
        }
    }
}

impl CacheConfig {
    pub fn max_body_bytes(&self) -> u64 {
        self.max_body_mb.saturating_mul(1024 * 1024)
    }
}

/// Integrity verification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Digest used for both path keys and content hashes
    pub algorithm: HashAlgorithm,

    /// Refuse paths with no hash manifest entry instead of serving them unverified
    pub require_listed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[origin]"));
        assert!(toml.contains("namespace_key = \"resource_path\""));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.api.success_code, "CIP0000000");
        assert_eq!(config.integrity.algorithm, HashAlgorithm::Md5);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [origin]
            base_url = "https://bundles.example.com"

            [cache]
            namespace_key = "version"

            [integrity]
            algorithm = "sha256"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.origin.base_url, "https://bundles.example.com");
        assert_eq!(config.origin.request_timeout_secs, 30); // default preserved
        assert_eq!(config.cache.namespace_key, NamespaceKey::Version);
        assert_eq!(config.integrity.algorithm, HashAlgorithm::Sha256);
    }
}

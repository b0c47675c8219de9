//! Configuration management for bundlegate

pub mod schema;

pub use schema::Config;

use crate::cache::atomic::write_atomic;
use crate::error::{GateError, GateResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bundlegate")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bundlegate")
    }

    /// Get the data directory holding both caches
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bundlegate")
    }

    /// Get the persisted key/value state file path
    pub fn state_file() -> PathBuf {
        Self::state_dir().join("state.json")
    }

    /// Get the audit log path
    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("audit.log")
    }

    /// Resource cache root, honoring the configured override
    pub fn cache_root(config: &Config) -> PathBuf {
        config
            .cache
            .root
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("webview_cache"))
    }

    /// Hash manifest cache root, honoring the configured override
    pub fn hash_root(config: &Config) -> PathBuf {
        config
            .cache
            .hash_root
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("hash_cache"))
    }

    /// Load configuration, creating default if not exists
    pub async fn load(&self) -> GateResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> GateResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| GateError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| GateError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration, replacing the file atomically
    pub async fn save(&self, config: &Config) -> GateResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        write_atomic(&self.config_path, content.into_bytes())
            .await
            .map_err(|e| {
                GateError::io(format!("writing config to {}", self.config_path.display()), e)
            })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> GateResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GateError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure state and cache directories exist
    pub async fn ensure_state_dirs(config: &Config) -> GateResult<()> {
        let dirs = [
            Self::state_dir(),
            Self::cache_root(config),
            Self::hash_root(config),
        ];

        for dir in &dirs {
            fs::create_dir_all(dir).await.map_err(|e| {
                GateError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }

        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.api.api_name, "mAppVersionQuery");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.origin.base_url = "https://cdn.example.com".to_string();

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.origin.base_url, "https://cdn.example.com");
    }

    #[tokio::test]
    async fn invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[origin\nbase_url = 1").unwrap();

        let err = ConfigManager::with_path(path.clone())
            .load()
            .await
            .unwrap_err();
        match err {
            GateError::ConfigInvalid { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cache_root_override() {
        let mut config = Config::default();
        config.cache.root = Some(PathBuf::from("/tmp/bg-cache"));
        assert_eq!(
            ConfigManager::cache_root(&config),
            PathBuf::from("/tmp/bg-cache")
        );
        assert!(ConfigManager::hash_root(&config).ends_with("hash_cache"));
    }
}

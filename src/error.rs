//! Error types for bundlegate
//!
//! All modules use `GateResult<T>` as their return type. Every variant maps
//! to a stable kind name and an HTTP-style status so the interception
//! boundary can turn any failure into a structured response.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bundlegate operations
pub type GateResult<T> = Result<T, GateError>;

/// All errors that can occur in bundlegate
#[derive(Error, Debug)]
pub enum GateError {
    // Network and manifest API errors
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),

    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("API rejected request: {code} - {message}")]
    ApiResponseError { code: String, message: String },

    #[error("API returned an empty response")]
    ApiResponseNull,

    // Hash manifest errors
    #[error("Resource download failed: {0}")]
    ResourceDownloadFailed(String),

    #[error("Resource not published: {0}")]
    ResourceNotFound(String),

    #[error("Resource content is empty: {0}")]
    ResourceContentNull(String),

    #[error("Resource could not be parsed: {0}")]
    ResourceParseError(String),

    // Cache and integrity errors
    #[error("Integrity check failed for {path}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Resource namespace not initialized")]
    NamespaceUninitialized,

    #[error("Failed to write cache entry {path}: {reason}")]
    CacheWriteFailed { path: String, reason: String },

    #[error("Rejected path {path}: {reason}")]
    PathRejected { path: String, reason: String },

    #[error("Origin returned HTTP {status} for {url}")]
    OriginStatus { status: u16, url: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl GateError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a path rejection error
    pub fn path_rejected(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathRejected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable upper-snake name used in logs, audit events and headers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NetworkUnavailable(_) => "NETWORK_UNAVAILABLE",
            Self::ServerUnavailable(_) => "SERVER_UNAVAILABLE",
            Self::RequestTimeout(_) => "API_REQUEST_TIMEOUT",
            Self::RequestFailed(_) => "API_REQUEST_FAILED",
            Self::ApiResponseError { .. } => "API_RESPONSE_ERROR",
            Self::ApiResponseNull => "API_RESPONSE_NULL",
            Self::ResourceDownloadFailed(_) => "RESOURCE_DOWNLOAD_FAILED",
            Self::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            Self::ResourceContentNull(_) => "RESOURCE_CONTENT_NULL",
            Self::ResourceParseError(_) => "RESOURCE_PARSE_ERROR",
            Self::IntegrityMismatch { .. } => "INTEGRITY_MISMATCH",
            Self::NamespaceUninitialized => "NAMESPACE_UNINITIALIZED",
            Self::CacheWriteFailed { .. } => "CACHE_WRITE_FAILED",
            Self::PathRejected { .. } => "PATH_REJECTED",
            Self::OriginStatus { .. } => "ORIGIN_STATUS",
            _ => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status reported at the interception boundary
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NamespaceUninitialized | Self::ServerUnavailable(_) => 503,
            Self::RequestTimeout(_) => 504,
            Self::NetworkUnavailable(_) | Self::RequestFailed(_) => 502,
            Self::PathRejected { .. } => 400,
            Self::OriginStatus { status, .. } => *status,
            _ => 500,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable(_)
                | Self::ServerUnavailable(_)
                | Self::RequestTimeout(_)
                | Self::ResourceDownloadFailed(_)
        ) || matches!(self, Self::OriginStatus { status, .. } if matches!(status, 408 | 503 | 504))
    }

    /// The origin answered definitively that there is nothing to load
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            Self::ResourceNotFound(_) | Self::ResourceContentNull(_)
        )
    }

    /// Copy of this error for every caller that shared one failed load
    ///
    /// Wrapped library errors are carried over as their message.
    pub fn replicate(&self) -> Self {
        match self {
            Self::NetworkUnavailable(s) => Self::NetworkUnavailable(s.clone()),
            Self::ServerUnavailable(s) => Self::ServerUnavailable(s.clone()),
            Self::RequestTimeout(s) => Self::RequestTimeout(s.clone()),
            Self::RequestFailed(s) => Self::RequestFailed(s.clone()),
            Self::ApiResponseError { code, message } => Self::ApiResponseError {
                code: code.clone(),
                message: message.clone(),
            },
            Self::ApiResponseNull => Self::ApiResponseNull,
            Self::ResourceDownloadFailed(s) => Self::ResourceDownloadFailed(s.clone()),
            Self::ResourceNotFound(s) => Self::ResourceNotFound(s.clone()),
            Self::ResourceContentNull(s) => Self::ResourceContentNull(s.clone()),
            Self::ResourceParseError(s) => Self::ResourceParseError(s.clone()),
            Self::IntegrityMismatch {
                path,
                expected,
                actual,
            } => Self::IntegrityMismatch {
                path: path.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::NamespaceUninitialized => Self::NamespaceUninitialized,
            Self::CacheWriteFailed { path, reason } => Self::CacheWriteFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::PathRejected { path, reason } => Self::PathRejected {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::OriginStatus { status, url } => Self::OriginStatus {
                status: *status,
                url: url.clone(),
            },
            Self::ConfigInvalid { path, reason } => Self::ConfigInvalid {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::ConfigDirCreate { path, source } => Self::ConfigDirCreate {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::Io { context, source } => Self::Io {
                context: context.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::Json(e) => Self::Internal(format!("JSON error: {e}")),
            Self::TomlParse(e) => Self::Internal(format!("TOML parse error: {e}")),
            Self::TomlSerialize(e) => Self::Internal(format!("TOML serialize error: {e}")),
            Self::Internal(s) => Self::Internal(s.clone()),
            Self::User(s) => Self::User(s.clone()),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NamespaceUninitialized => Some("Run: bundlegate resolve"),
            Self::NetworkUnavailable(_) => Some("Check connectivity or origin.base_url"),
            Self::ConfigInvalid { .. } => Some("Run: bundlegate config init --force"),
            Self::IntegrityMismatch { .. } => {
                Some("The origin served content that does not match the hash manifest")
            }
            _ => None,
        }
    }
}

//! Cache namespaces and relative path normalization
//!
//! Both are validated before anything touches the filesystem, so a request
//! path can never name a file outside its namespace directory.

use crate::error::{GateError, GateResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which manifest field names the cache namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceKey {
    /// `resourcePath`, used by current deployments
    #[default]
    ResourcePath,
    /// The bare `resourceVersion` token, used by legacy deployments
    Version,
}

impl fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourcePath => write!(f, "resource_path"),
            Self::Version => write!(f, "version"),
        }
    }
}

/// Directory-scoped identity of one deployed bundle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheNamespace(String);

impl CacheNamespace {
    /// Validate a namespace name
    ///
    /// Nested names such as `h5/2.4.0` are allowed; traversal segments,
    /// leading separators, backslashes and NUL bytes are not.
    pub fn new(name: impl Into<String>) -> GateResult<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(GateError::path_rejected(name, "empty namespace"));
        }
        if trimmed.starts_with('/') {
            return Err(GateError::path_rejected(name, "absolute namespace"));
        }
        check_forbidden_chars(trimmed)?;
        for segment in trimmed.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(GateError::path_rejected(
                    trimmed,
                    "namespace segments must be plain names",
                ));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Flat file name used by the hash manifest cache
    pub fn file_stem(&self) -> String {
        self.0.replace(['/', '\\'], "_")
    }

    /// Directory of this namespace under a cache root
    pub fn dir_in(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |p, s| p.join(s))
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CacheNamespace {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

fn check_forbidden_chars(path: &str) -> GateResult<()> {
    if path.contains('\0') {
        return Err(GateError::path_rejected(path.replace('\0', "\\0"), "NUL byte"));
    }
    if path.contains('\\') {
        return Err(GateError::path_rejected(path, "backslash separator"));
    }
    Ok(())
}

/// Normalize a request path into a namespace-relative path
///
/// Leading separators, `.` segments and repeated separators are dropped.
/// `..` segments and drive-qualified paths are rejected.
pub fn normalize_relative(path: &str) -> GateResult<String> {
    check_forbidden_chars(path)?;

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(GateError::path_rejected(path, "parent directory segment")),
            s if segments.is_empty() && s.len() == 2 && s.ends_with(':') => {
                return Err(GateError::path_rejected(path, "absolute path"));
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(GateError::path_rejected(path, "invalid path"));
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_accepts_nested_names() {
        let ns = CacheNamespace::new("h5/2.4.0").unwrap();
        assert_eq!(ns.file_stem(), "h5_2.4.0");
        assert_eq!(
            ns.dir_in(Path::new("/cache")),
            PathBuf::from("/cache/h5/2.4.0")
        );
    }

    #[test]
    fn namespace_rejects_traversal() {
        for bad in ["", "  ", "../x", "a/../b", "/abs", "a\\b", "a//b", "a\0"] {
            assert!(CacheNamespace::new(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn namespace_deserialize_validates() {
        let ok: CacheNamespace = serde_json::from_str("\"v1\"").unwrap();
        assert_eq!(ok.as_str(), "v1");
        assert!(serde_json::from_str::<CacheNamespace>("\"../v1\"").is_err());
    }

    #[test]
    fn normalize_strips_noise() {
        assert_eq!(normalize_relative("/build/main.js").unwrap(), "build/main.js");
        assert_eq!(
            normalize_relative("//build/./js//app.js").unwrap(),
            "build/js/app.js"
        );
    }

    #[test]
    fn normalize_rejects_escapes() {
        for bad in [
            "",
            "/",
            "../etc/passwd",
            "/build/../../secret",
            "build\\main.js",
            "C:/windows",
            "a\0b",
        ] {
            let err = normalize_relative(bad).unwrap_err();
            assert_eq!(err.status_code(), 400, "{bad:?}");
        }
    }

    #[test]
    fn namespace_key_names() {
        assert_eq!(NamespaceKey::default(), NamespaceKey::ResourcePath);
        assert_eq!(NamespaceKey::Version.to_string(), "version");
    }
}

//! Per-namespace hash index
//!
//! The index maps `hash(relative_path)` to `hash(expected_content)`, both
//! lowercase hex. Keys are hashed paths rather than raw paths because that
//! is the format the manifest generator publishes.

use crate::error::{GateError, GateResult};
use crate::integrity::HashAlgorithm;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Outcome of checking bytes against the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrity {
    /// Digest matched the index entry
    Verified,
    /// The index has no entry for this path
    Unverified,
    /// Digest did not match the index entry
    Failed,
}

impl Integrity {
    /// Value of the `X-Integrity` response header
    pub fn header_value(&self) -> &'static str {
        match self {
            Self::Verified => "VALID",
            Self::Unverified => "UNVERIFIED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::Unverified => write!(f, "unverified"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Detailed verification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub status: Integrity,
    pub expected: Option<String>,
    pub actual: String,
}

/// Read-only map of path digests to content digests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashIndex {
    algorithm: HashAlgorithm,
    records: HashMap<String, String>,
}

impl HashIndex {
    /// Wrap already-hashed records
    pub fn new(algorithm: HashAlgorithm, records: HashMap<String, String>) -> Self {
        let records = records
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_ascii_lowercase()))
            .collect();
        Self { algorithm, records }
    }

    /// Build an index from raw `(relative_path, content)` pairs
    pub fn from_contents<'a, I>(algorithm: HashAlgorithm, files: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let records = files
            .into_iter()
            .map(|(path, content)| {
                (
                    algorithm.hex_digest(path.as_bytes()),
                    algorithm.hex_digest(content),
                )
            })
            .collect();
        Self { algorithm, records }
    }

    /// Parse the JSON document served at `resource_hashes`
    pub fn parse(algorithm: HashAlgorithm, content: &str) -> GateResult<Self> {
        if content.trim().is_empty() {
            return Err(GateError::ResourceContentNull(
                "hash manifest is empty".to_string(),
            ));
        }

        let records: HashMap<String, String> = serde_json::from_str(content)
            .map_err(|e| GateError::ResourceParseError(e.to_string()))?;

        if records.is_empty() {
            return Err(GateError::ResourceParseError(
                "hash manifest has no records".to_string(),
            ));
        }

        Ok(Self::new(algorithm, records))
    }

    /// Serialize back to the wire document
    pub fn to_json(&self) -> GateResult<String> {
        Ok(serde_json::to_string(&self.records)?)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Expected content digest for a relative path
    ///
    /// Tries the path as given, then with its leading separator toggled,
    /// since manifest generators do not normalize paths consistently.
    pub fn expected_for(&self, relative_path: &str) -> Option<&str> {
        if relative_path.is_empty() {
            return None;
        }

        if let Some(expected) = self.record(relative_path) {
            return Some(expected);
        }
        match relative_path.strip_prefix('/') {
            Some(stripped) => self.record(stripped),
            None => self.record(&format!("/{relative_path}")),
        }
    }

    /// Expected digest for an intercepted request
    ///
    /// The path as the renderer requested it wins over its normalized form.
    pub fn expected_for_request(&self, requested: &str, relative_path: &str) -> Option<&str> {
        self.expected_for(requested)
            .or_else(|| self.expected_for(relative_path))
    }

    /// Check `data` against the entry for `relative_path`
    pub fn verify(&self, relative_path: &str, data: &[u8]) -> Verification {
        self.check(self.expected_for(relative_path), data)
    }

    /// Check `data` served for a request against its entry
    pub fn verify_request(&self, requested: &str, relative_path: &str, data: &[u8]) -> Verification {
        self.check(self.expected_for_request(requested, relative_path), data)
    }

    fn record(&self, path: &str) -> Option<&str> {
        let key = self.algorithm.hex_digest(path.as_bytes());
        self.records.get(&key).map(String::as_str)
    }

    fn check(&self, expected: Option<&str>, data: &[u8]) -> Verification {
        let actual = self.algorithm.hex_digest(data);
        match expected {
            None => Verification {
                status: Integrity::Unverified,
                expected: None,
                actual,
            },
            Some(expected) => Verification {
                status: if expected.eq_ignore_ascii_case(&actual) {
                    Integrity::Verified
                } else {
                    Integrity::Failed
                },
                expected: Some(expected.to_string()),
                actual,
            },
        }
    }

    /// First few records, for diagnostics
    pub fn sample(&self, n: usize) -> Vec<(&str, &str)> {
        let mut sample: Vec<(&str, &str)> = self
            .records
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        sample.sort();
        sample.truncate(n);
        sample
    }
}

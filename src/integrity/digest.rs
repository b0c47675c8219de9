//! One-way digests used for hash manifest keys and content checks

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Digest algorithm shared by path keys and content hashes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// MD5, the format published by existing manifest generators
    #[default]
    Md5,
    /// SHA-256
    Sha256,
}

impl HashAlgorithm {
    /// Lowercase hex digest of `data`
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_known_vector() {
        assert_eq!(
            HashAlgorithm::Md5.hex_digest(b"main.js"),
            hex::encode(Md5::digest(b"main.js"))
        );
        assert_eq!(
            HashAlgorithm::Md5.hex_digest(b""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            HashAlgorithm::Sha256.hex_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn display_matches_serde_name() {
        assert_eq!(HashAlgorithm::Sha256.to_string(), "sha256");
        let parsed: HashAlgorithm = serde_json::from_str("\"md5\"").unwrap();
        assert_eq!(parsed, HashAlgorithm::Md5);
    }
}

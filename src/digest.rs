//! Content digests for artifact verification.
//!
//! Manifests declare one hex digest per artifact. The hash algorithm is fixed
//! by the manifest's `format_version` (version 1 is SHA-256, matching the
//! `sha256` stanza of a Homebrew formula), so the digest length is known up
//! front and malformed digests are rejected when the manifest is built.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hash algorithm a manifest was authored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
}

impl DigestAlgorithm {
    /// Select the algorithm for a manifest format version.
    pub fn for_format(format_version: u32) -> Option<Self> {
        match format_version {
            1 => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }

    /// The manifest format version that selects this algorithm.
    pub fn format_version(&self) -> u32 {
        match self {
            DigestAlgorithm::Sha256 => 1,
        }
    }

    /// Number of hex characters in a digest produced by this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The digest collaborator: turns artifact bytes into a hex digest.
pub trait ContentHasher {
    fn algorithm(&self) -> DigestAlgorithm;
    fn hash(&self, bytes: &[u8]) -> HexDigest;
}

impl ContentHasher for DigestAlgorithm {
    fn algorithm(&self) -> DigestAlgorithm {
        *self
    }

    fn hash(&self, bytes: &[u8]) -> HexDigest {
        match self {
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(bytes);
                HexDigest {
                    algorithm: *self,
                    hex: format!("{:x}", hasher.finalize()),
                }
            }
        }
    }
}

/// A validated, lowercase hex digest tagged with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexDigest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl HexDigest {
    /// Validate `value` as a digest for `algorithm`.
    ///
    /// Uppercase hex is accepted and normalized to lowercase. The error is a
    /// human-readable reason; callers wrap it with the platform it belongs to.
    pub fn parse(algorithm: DigestAlgorithm, value: &str) -> Result<Self, String> {
        let value = value.trim();
        let expected = algorithm.hex_len();
        if value.len() != expected {
            return Err(format!(
                "expected {expected} hex characters for {algorithm}, got {}",
                value.len()
            ));
        }
        if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(format!("non-hex character '{bad}'"));
        }
        Ok(Self {
            algorithm,
            hex: value.to_ascii_lowercase(),
        })
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Compare against another digest without stopping at the first
    /// differing byte.
    ///
    /// Every position is folded into the result so the comparison takes the
    /// same path regardless of where a mismatch sits.
    pub fn matches(&self, other: &HexDigest) -> bool {
        if self.algorithm != other.algorithm {
            return false;
        }
        constant_structure_eq(self.hex.as_bytes(), other.hex.as_bytes())
    }
}

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

fn constant_structure_eq(a: &[u8], b: &[u8]) -> bool {
    // Lengths are fixed per algorithm, so a length mismatch reveals nothing.
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

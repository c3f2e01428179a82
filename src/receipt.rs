//! Install receipts.
//!
//! Every keg gets an `INSTALL_RECEIPT.json` recording exactly which artifact
//! was installed: the release, the platform it was resolved for, the
//! locator it came from and the digest it was verified against.
//!
//! ```text
//! /opt/homebrew/Cellar/laio/0.10.0/
//!   INSTALL_RECEIPT.json
//!   bin/
//!     laio
//! ```

use crate::resolver::Ready;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    pub locator: String,
    pub algorithm: String,
    pub digest: String,
    /// Unix timestamp of the install.
    pub time: i64,
    pub steep_version: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl InstallReceipt {
    pub fn for_ready(ready: &Ready) -> Self {
        let entry = ready.entry();
        Self {
            name: ready.name().to_string(),
            version: ready.version().to_string(),
            os: entry.platform.os.to_string(),
            arch: entry.platform.arch.to_string(),
            locator: entry.locator.to_string(),
            algorithm: entry.digest.algorithm().to_string(),
            digest: entry.digest.to_string(),
            time: chrono::Utc::now().timestamp(),
            steep_version: env!("CARGO_PKG_VERSION").to_string(),
            depends_on: ready.depends_on().to_vec(),
        }
    }

    pub fn read(keg: &Path) -> Result<Self> {
        let path = keg.join(RECEIPT_FILE);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read receipt: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse receipt: {}", path.display()))
    }

    pub fn write(&self, keg: &Path) -> Result<()> {
        let path = keg.join(RECEIPT_FILE);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize receipt")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write receipt: {}", path.display()))
    }

    /// Human-readable install time.
    pub fn installed_at(&self) -> String {
        chrono::DateTime::from_timestamp(self.time, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.time.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> InstallReceipt {
        InstallReceipt {
            name: "laio".to_string(),
            version: "0.10.0".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            locator: "https://example.org/laio.tgz".to_string(),
            algorithm: "sha256".to_string(),
            digest: "a".repeat(64),
            time: 1_700_000_000,
            steep_version: "0.1.0".to_string(),
            depends_on: vec!["tmux".to_string()],
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let written = receipt();
        written.write(dir.path()).unwrap();
        assert_eq!(InstallReceipt::read(dir.path()).unwrap(), written);
    }

    #[test]
    fn test_read_missing_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let err = InstallReceipt::read(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to read receipt"));
    }

    #[test]
    fn test_installed_at() {
        assert_eq!(receipt().installed_at(), "2023-11-14 22:13:20 UTC");
    }
}

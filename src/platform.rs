//! Platform identifiers and host detection.
//!
//! A release manifest declares artifacts per operating system and CPU
//! architecture. Formula files spell these several ways (`darwin` vs `macos`,
//! `intel` vs `x86_64`, `arm64` vs `aarch64`), so parsing accepts the common
//! aliases and normalizes them to [`Os`] and [`Arch`].
//!
//! Unrecognized identifiers never fall back to a default: [`Os::parse`] and
//! [`Arch::parse`] return `None`, and the resolver reports the platform as
//! not found. Installing the wrong binary is worse than failing.
//!
//! # Examples
//!
//! ```
//! use steep::platform::{Arch, Os, Platform};
//!
//! let platform = Platform::from_names("darwin", "arm64").unwrap();
//! assert_eq!(platform, Platform::new(Os::Macos, Arch::Aarch64));
//! assert_eq!(platform.to_string(), "macos/aarch64");
//!
//! assert!(Platform::from_names("macos", "sparc").is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system an artifact targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Macos,
    Linux,
}

impl Os {
    pub const ALL: [Os; 2] = [Os::Macos, Os::Linux];

    /// Parse an OS identifier, accepting `darwin`/`osx` for macOS.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "macos" | "darwin" | "osx" | "mac" => Some(Os::Macos),
            "linux" => Some(Os::Linux),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Macos => "macos",
            Os::Linux => "linux",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture an artifact targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    pub const ALL: [Arch; 2] = [Arch::X86_64, Arch::Aarch64];

    /// Parse an architecture identifier.
    ///
    /// `intel`, `amd64` and `x64` map to [`Arch::X86_64`]; `arm64` maps to
    /// [`Arch::Aarch64`]. Plain `arm` is 32-bit ARM and is not recognized.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "x86-64" | "amd64" | "x64" | "intel" => Some(Arch::X86_64),
            "aarch64" | "arm64" => Some(Arch::Aarch64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An (operating system, architecture) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Parse both identifiers; `None` if either is unrecognized.
    pub fn from_names(os: &str, arch: &str) -> Option<Self> {
        Some(Self::new(Os::parse(os)?, Arch::parse(arch)?))
    }

    /// Every platform the engine knows how to describe.
    pub fn all() -> impl Iterator<Item = Platform> {
        Os::ALL
            .into_iter()
            .flat_map(|os| Arch::ALL.into_iter().map(move |arch| Platform::new(os, arch)))
    }

    /// Detect the platform this process runs on.
    ///
    /// Returns `None` on hosts outside the supported matrix (e.g. Windows, or
    /// 32-bit ARM) instead of guessing.
    pub fn detect() -> Option<Self> {
        Self::from_names(std::env::consts::OS, std::env::consts::ARCH)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

//! Release manifests: one version of a package and its per-platform artifacts.
//!
//! A manifest is the structured form of a Homebrew formula's `on_macos` /
//! `on_linux` blocks. Each (os, arch) pair either declares a download
//! locator with its digest, or an explicit unsupported marker carrying an
//! operator-facing reason (e.g. "Intel Macs are no longer supported").
//!
//! Manifests are validated once, in [`ReleaseManifest::build`], and are
//! immutable afterwards, so a single value can be shared across concurrent
//! resolutions.
//!
//! # Document format
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "name": "laio",
//!   "version": "0.10.0",
//!   "homepage": "https://laio.sh",
//!   "depends_on": ["tmux"],
//!   "platforms": [
//!     { "os": "macos", "arch": "x86_64", "unsupported": "Intel Macs are no longer supported" },
//!     { "os": "linux", "arch": "x86_64", "url": "https://...", "sha256": "..." }
//!   ]
//! }
//! ```
//!
//! # Examples
//!
//! ```
//! use steep::manifest::{EntrySpec, Lookup, ReleaseManifest};
//! use steep::platform::{Arch, Os};
//!
//! let manifest = ReleaseManifest::build(
//!     "0.10.0",
//!     vec![
//!         EntrySpec::available("macos", "aarch64", "https://example.org/laio.tgz", &"ab".repeat(32)),
//!         EntrySpec::unsupported("macos", "x86_64", "Intel Macs are no longer supported"),
//!     ],
//! )
//! .unwrap();
//!
//! assert!(matches!(manifest.lookup(Os::Macos, Arch::Aarch64), Lookup::Found(_)));
//! assert!(matches!(manifest.lookup(Os::Macos, Arch::X86_64), Lookup::Unsupported(_)));
//! assert_eq!(manifest.lookup(Os::Linux, Arch::X86_64), Lookup::NotFound);
//! ```

use crate::digest::{DigestAlgorithm, HexDigest};
use crate::error::{Result, SteepError};
use crate::platform::{Arch, Os, Platform};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path};
use url::Url;

const DEFAULT_FORMAT_VERSION: u32 = 1;
const SUPPORTED_SCHEMES: &[&str] = &["https", "http", "file"];

/// A downloadable artifact for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEntry {
    pub platform: Platform,
    pub locator: Url,
    pub digest: HexDigest,
}

/// An explicit "no artifact for this platform" declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedPlatform {
    pub platform: Platform,
    pub reason: String,
}

/// One validated declaration in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Available(PlatformEntry),
    Unsupported(UnsupportedPlatform),
}

impl Declaration {
    pub fn platform(&self) -> Platform {
        match self {
            Declaration::Available(entry) => entry.platform,
            Declaration::Unsupported(marker) => marker.platform,
        }
    }
}

/// Result of looking a platform up in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a PlatformEntry),
    Unsupported(&'a UnsupportedPlatform),
    /// Nothing was ever declared for the platform.
    NotFound,
}

/// Unvalidated platform declaration, as it appears in a manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySpec {
    pub os: String,
    pub arch: String,
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, alias = "sha256", skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsupported: Option<String>,
}

impl EntrySpec {
    pub fn available(os: &str, arch: &str, locator: &str, digest: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            locator: Some(locator.to_string()),
            digest: Some(digest.to_string()),
            unsupported: None,
        }
    }

    pub fn unsupported(os: &str, arch: &str, reason: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            unsupported: Some(reason.to_string()),
            ..Self::default()
        }
    }
}

/// Package-level metadata carried alongside the platform table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// File placed into `bin/` on install; defaults to the package name.
    #[serde(default)]
    pub binary: Option<String>,
}

/// Serialized form of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDocument {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub version: String,
    #[serde(flatten)]
    pub package: PackageInfo,
    #[serde(default)]
    pub platforms: Vec<EntrySpec>,
}

fn default_format_version() -> u32 {
    DEFAULT_FORMAT_VERSION
}

impl ManifestDocument {
    pub fn into_manifest(self) -> Result<ReleaseManifest> {
        let algorithm = DigestAlgorithm::for_format(self.format_version)
            .ok_or(SteepError::UnsupportedFormat(self.format_version))?;
        validate_file_name("name", &self.package.name)?;
        if let Some(binary) = &self.package.binary {
            validate_file_name("binary", binary)?;
        }
        let mut manifest = ReleaseManifest::build_with(algorithm, &self.version, self.platforms)?;
        manifest.package = self.package;
        Ok(manifest)
    }
}

/// A validated, immutable release manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseManifest {
    version: Version,
    algorithm: DigestAlgorithm,
    package: PackageInfo,
    declarations: Vec<Declaration>,
}

impl ReleaseManifest {
    /// Build a SHA-256 manifest from unvalidated entries.
    ///
    /// # Errors
    ///
    /// - [`SteepError::InvalidVersion`] if `version` is not SemVer
    /// - [`SteepError::UnknownPlatform`] for os/arch names the engine does not know
    /// - [`SteepError::MalformedDigest`] if a present digest is not well-formed hex
    ///   of the algorithm's length
    /// - [`SteepError::InvalidLocator`] if a present locator is not an absolute URL
    /// - [`SteepError::DuplicatePlatform`] if two entries share (os, arch)
    pub fn build(version: &str, entries: Vec<EntrySpec>) -> Result<Self> {
        Self::build_with(DigestAlgorithm::default(), version, entries)
    }

    pub fn build_with(
        algorithm: DigestAlgorithm,
        version: &str,
        entries: Vec<EntrySpec>,
    ) -> Result<Self> {
        let version = parse_version(version)?;

        let mut seen = HashSet::new();
        let mut declarations = Vec::with_capacity(entries.len());
        for spec in entries {
            let declaration = validate_entry(algorithm, spec)?;
            let platform = declaration.platform();
            if !seen.insert(platform) {
                return Err(SteepError::DuplicatePlatform {
                    version: version.to_string(),
                    platform: platform.to_string(),
                });
            }
            declarations.push(declaration);
        }

        Ok(Self {
            version,
            algorithm,
            package: PackageInfo::default(),
            declarations,
        })
    }

    /// Parse a manifest from its JSON document form.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: ManifestDocument = serde_json::from_str(json)?;
        document.into_manifest()
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Find the declaration for (os, arch).
    pub fn lookup(&self, os: Os, arch: Arch) -> Lookup<'_> {
        let wanted = Platform::new(os, arch);
        match self.declarations.iter().find(|d| d.platform() == wanted) {
            Some(Declaration::Available(entry)) => Lookup::Found(entry),
            Some(Declaration::Unsupported(marker)) => Lookup::Unsupported(marker),
            None => Lookup::NotFound,
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn package(&self) -> &PackageInfo {
        &self.package
    }

    /// Package name, or `"package"` when the manifest carries none.
    pub fn name(&self) -> &str {
        if self.package.name.is_empty() {
            "package"
        } else {
            &self.package.name
        }
    }

    /// Name of the file `install` places into `bin/`.
    pub fn binary(&self) -> &str {
        self.package
            .binary
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| self.name())
    }

    /// Declarations in the order they were authored.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Entries with a downloadable artifact.
    pub fn entries(&self) -> impl Iterator<Item = &PlatformEntry> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Available(entry) => Some(entry),
            Declaration::Unsupported(_) => None,
        })
    }

    /// Convert back to the document form.
    pub fn to_document(&self) -> ManifestDocument {
        let platforms = self
            .declarations
            .iter()
            .map(|d| match d {
                Declaration::Available(entry) => EntrySpec::available(
                    entry.platform.os.as_str(),
                    entry.platform.arch.as_str(),
                    entry.locator.as_str(),
                    entry.digest.as_str(),
                ),
                Declaration::Unsupported(marker) => EntrySpec::unsupported(
                    marker.platform.os.as_str(),
                    marker.platform.arch.as_str(),
                    &marker.reason,
                ),
            })
            .collect();

        ManifestDocument {
            format_version: self.algorithm.format_version(),
            version: self.version.to_string(),
            package: self.package.clone(),
            platforms,
        }
    }
}

/// Whether `value` names a single file, with no separators or `.`/`..`.
///
/// Package names become keg directories and binaries become `bin/` entries,
/// so anything else could place files outside the keg.
pub(crate) fn is_file_name(value: &str) -> bool {
    if value.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn validate_file_name(field: &'static str, value: &str) -> Result<()> {
    // Empty values fall back to defaults.
    if value.is_empty() || is_file_name(value) {
        Ok(())
    } else {
        Err(SteepError::InvalidPackage {
            field,
            value: value.to_string(),
        })
    }
}

fn parse_version(version: &str) -> Result<Version> {
    let trimmed = version.trim();
    // Formula tags are often written with a leading `v`.
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).map_err(|e| SteepError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

fn validate_entry(algorithm: DigestAlgorithm, spec: EntrySpec) -> Result<Declaration> {
    let platform =
        Platform::from_names(&spec.os, &spec.arch).ok_or_else(|| SteepError::UnknownPlatform {
            os: spec.os.clone(),
            arch: spec.arch.clone(),
        })?;

    let locator = spec.locator.as_deref().map(str::trim).unwrap_or_default();
    let digest = spec.digest.as_deref().map(str::trim).unwrap_or_default();

    // A present digest is validated even on unsupported entries: it signals
    // template data that was never filled in.
    let digest = if digest.is_empty() {
        None
    } else {
        Some(
            HexDigest::parse(algorithm, digest).map_err(|reason| SteepError::MalformedDigest {
                platform: platform.to_string(),
                reason,
            })?,
        )
    };

    if let Some(reason) = spec.unsupported {
        return Ok(Declaration::Unsupported(UnsupportedPlatform { platform, reason }));
    }

    match (locator.is_empty(), digest) {
        (false, Some(digest)) => {
            let locator = parse_locator(platform, locator)?;
            Ok(Declaration::Available(PlatformEntry {
                platform,
                locator,
                digest,
            }))
        }
        _ => Ok(Declaration::Unsupported(UnsupportedPlatform {
            platform,
            reason: format!("no artifact published for {platform}"),
        })),
    }
}

fn parse_locator(platform: Platform, locator: &str) -> Result<Url> {
    let url = Url::parse(locator).map_err(|e| SteepError::InvalidLocator {
        platform: platform.to_string(),
        reason: format!("'{locator}': {e}"),
    })?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(SteepError::InvalidLocator {
            platform: platform.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

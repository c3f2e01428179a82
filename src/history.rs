//! Append-only release history.
//!
//! Formula repositories accumulate one revision per release, each nearly
//! identical to the last. [`ReleaseHistory`] keeps those as an ordered
//! sequence of immutable manifests keyed by version: releases can be added
//! at the end but never replaced or reordered.
//!
//! On disk a history is either a JSON array of manifest documents, or a
//! directory holding one `*.json` manifest per release. A file containing a
//! single manifest object is a history of one.

use crate::error::{Result, SteepError};
use crate::manifest::{ManifestDocument, ReleaseManifest};
use semver::Version;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ReleaseHistory {
    releases: Vec<Arc<ReleaseManifest>>,
}

impl ReleaseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a release.
    ///
    /// Fails with [`SteepError::DuplicateRelease`] if the version is already
    /// present, or [`SteepError::OutOfOrderRelease`] if it is older than the
    /// latest release.
    pub fn push(&mut self, manifest: ReleaseManifest) -> Result<Arc<ReleaseManifest>> {
        if let Some(latest) = self.latest() {
            if latest.version() == manifest.version() {
                return Err(SteepError::DuplicateRelease(manifest.version().to_string()));
            }
            if latest.version() > manifest.version() {
                return Err(SteepError::OutOfOrderRelease {
                    version: manifest.version().to_string(),
                    latest: latest.version().to_string(),
                });
            }
        }
        let manifest = Arc::new(manifest);
        self.releases.push(Arc::clone(&manifest));
        Ok(manifest)
    }

    /// Build a history from manifests in any order.
    pub fn from_manifests(manifests: impl IntoIterator<Item = ReleaseManifest>) -> Result<Self> {
        let mut manifests: Vec<_> = manifests.into_iter().collect();
        manifests.sort_by(|a, b| a.version().cmp(b.version()));

        let mut history = Self::new();
        for manifest in manifests {
            history.push(manifest)?;
        }
        Ok(history)
    }

    /// Load a history from a manifest file, a JSON array file, or a directory.
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Self::load_dir(path);
        }

        let contents = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;
        let documents: Vec<ManifestDocument> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };

        let manifests = documents
            .into_iter()
            .map(ManifestDocument::into_manifest)
            .collect::<Result<Vec<_>>>()?;
        debug!(path = %path.display(), releases = manifests.len(), "loaded manifests");
        Self::from_manifests(manifests)
    }

    fn load_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == "json"))
            .collect();
        paths.sort();

        let manifests = paths
            .iter()
            .map(|path| ReleaseManifest::load(path))
            .collect::<Result<Vec<_>>>()?;
        debug!(dir = %dir.display(), releases = manifests.len(), "loaded manifest directory");
        Self::from_manifests(manifests)
    }

    pub fn latest(&self) -> Option<&Arc<ReleaseManifest>> {
        self.releases.last()
    }

    pub fn get(&self, version: &Version) -> Option<&Arc<ReleaseManifest>> {
        self.releases
            .binary_search_by(|m| m.version().cmp(version))
            .ok()
            .map(|i| &self.releases[i])
    }

    /// Select a release by version string, or the latest when `None`.
    pub fn select(&self, version: Option<&str>) -> Result<Arc<ReleaseManifest>> {
        let found = match version {
            Some(raw) => {
                let trimmed = raw.trim().trim_start_matches('v');
                let parsed =
                    Version::parse(trimmed).map_err(|e| SteepError::InvalidVersion {
                        version: raw.to_string(),
                        reason: e.to_string(),
                    })?;
                self.get(&parsed)
            }
            None => self.latest(),
        };
        found
            .cloned()
            .ok_or_else(|| SteepError::ReleaseNotFound(version.unwrap_or("latest").to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ReleaseManifest>> {
        self.releases.iter()
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

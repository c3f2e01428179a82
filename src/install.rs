//! Binary placement into a keg.
//!
//! This is the equivalent of a formula's `bin.install "laio"` step. Release
//! artifacts are usually gzip-compressed tarballs containing the binary,
//! sometimes nested inside a directory; some are the bare executable. Either
//! way the installer ends up with:
//!
//! ```text
//! <prefix>/Cellar/laio/0.10.0/
//!   bin/
//!     laio
//! ```
//!
//! Unpacking happens in a staging directory next to the keg. The keg is only
//! replaced once staging succeeded, and staging is always removed, so a
//! failed install leaves no partial keg behind.

use crate::manifest::is_file_name;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tar::Archive;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("invalid install destination {}", .0.display())]
    InvalidDestination(PathBuf),

    #[error("failed to unpack archive: {0}")]
    Archive(String),

    #[error("invalid binary name '{0}'")]
    InvalidBinary(String),

    #[error("binary '{0}' not found in archive")]
    BinaryNotFound(String),

    #[error("installer task did not complete: {0}")]
    Interrupted(String),

    #[error("post-install step failed: {0}")]
    PostInstall(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The installer collaborator: `place(bytes, destination)`.
///
/// Only verified bytes reach an installer. Implementations are not expected
/// to be idempotent; the resolver never retries them. `place` is called on
/// the blocking thread pool, so it may do synchronous filesystem work.
pub trait Installer: Send + Sync {
    /// Place `bytes` at `destination`, returning the installed entry point.
    fn place(&self, bytes: &[u8], destination: &Path) -> Result<PathBuf, InstallError>;
}

impl<T: Installer + ?Sized> Installer for std::sync::Arc<T> {
    fn place(&self, bytes: &[u8], destination: &Path) -> Result<PathBuf, InstallError> {
        (**self).place(bytes, destination)
    }
}

/// Installs one named binary into `<destination>/bin/`.
#[derive(Debug, Clone)]
pub struct KegInstaller {
    binary: String,
}

impl KegInstaller {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn stage(&self, bytes: &[u8], staging: &Path) -> Result<PathBuf, InstallError> {
        let keg = staging.join("keg");
        let bin_dir = keg.join("bin");
        fs::create_dir_all(&bin_dir)?;
        let target = bin_dir.join(&self.binary);

        if bytes.starts_with(&GZIP_MAGIC) {
            let unpacked = staging.join("unpacked");
            fs::create_dir_all(&unpacked)?;
            let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));
            archive
                .unpack(&unpacked)
                .map_err(|e| InstallError::Archive(e.to_string()))?;

            let found = find_binary(&unpacked, &self.binary)
                .ok_or_else(|| InstallError::BinaryNotFound(self.binary.clone()))?;
            debug!(binary = %found.display(), "found binary in archive");
            fs::rename(&found, &target)?;
        } else {
            fs::write(&target, bytes)?;
        }

        make_executable(&target)?;
        Ok(keg)
    }
}

impl Installer for KegInstaller {
    fn place(&self, bytes: &[u8], destination: &Path) -> Result<PathBuf, InstallError> {
        if !is_file_name(&self.binary) {
            return Err(InstallError::InvalidBinary(self.binary.clone()));
        }
        let parent = destination
            .parent()
            .ok_or_else(|| InstallError::InvalidDestination(destination.to_path_buf()))?;
        let keg_name = destination
            .file_name()
            .ok_or_else(|| InstallError::InvalidDestination(destination.to_path_buf()))?;
        fs::create_dir_all(parent)?;

        let staging = parent.join(format!(".{}.staging", keg_name.to_string_lossy()));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let result = self.stage(bytes, &staging).and_then(|keg| {
            if destination.exists() {
                debug!(keg = %destination.display(), "replacing existing keg");
                fs::remove_dir_all(destination)?;
            }
            fs::rename(&keg, destination)?;
            Ok(destination.join("bin").join(&self.binary))
        });

        let _ = fs::remove_dir_all(&staging);
        result
    }
}

/// Find a regular file named `binary`, preferring the shallowest match.
fn find_binary(root: &Path, binary: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == binary)
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn tgz(entries: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_place_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let keg = dir.path().join("Cellar/laio/0.10.0");
        let bytes = tgz(&[("laio", "#!/bin/sh\necho laio\n"), ("LICENSE", "MIT")]);

        let installed = KegInstaller::new("laio").place(&bytes, &keg).unwrap();

        assert_eq!(installed, keg.join("bin/laio"));
        assert_eq!(fs::read(&installed).unwrap(), b"#!/bin/sh\necho laio\n");
        assert!(!dir.path().join("Cellar/laio/.0.10.0.staging").exists());
    }

    #[test]
    fn test_place_nested_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let keg = dir.path().join("keg");
        let bytes = tgz(&[("laio-0.10.0-x86_64-linux/laio", "binary")]);

        let installed = KegInstaller::new("laio").place(&bytes, &keg).unwrap();
        assert_eq!(fs::read(installed).unwrap(), b"binary");
    }

    #[cfg(unix)]
    #[test]
    fn test_placed_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let keg = dir.path().join("keg");
        let installed = KegInstaller::new("tool")
            .place(&tgz(&[("tool", "x")]), &keg)
            .unwrap();
        let mode = fs::metadata(installed).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_place_raw_binary() {
        let dir = tempfile::tempdir().unwrap();
        let keg = dir.path().join("keg");
        let installed = KegInstaller::new("tool")
            .place(b"\x7fELF raw", &keg)
            .unwrap();
        assert_eq!(fs::read(installed).unwrap(), b"\x7fELF raw");
    }

    #[test]
    fn test_missing_binary_leaves_no_keg() {
        let dir = tempfile::tempdir().unwrap();
        let keg = dir.path().join("keg");
        let bytes = tgz(&[("README.md", "docs")]);

        let err = KegInstaller::new("laio").place(&bytes, &keg).unwrap_err();

        assert!(matches!(err, InstallError::BinaryNotFound(ref b) if b == "laio"));
        assert!(!keg.exists());
        assert!(!dir.path().join(".keg.staging").exists());
    }

    #[test]
    fn test_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let keg = dir.path().join("keg");
        let mut bytes = GZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"not really gzip");

        let err = KegInstaller::new("laio").place(&bytes, &keg).unwrap_err();
        assert!(matches!(err, InstallError::Archive(_)), "{err}");
        assert!(!keg.exists());
    }

    #[test]
    fn test_reinstall_replaces_keg() {
        let dir = tempfile::tempdir().unwrap();
        let keg = dir.path().join("keg");
        let installer = KegInstaller::new("laio");

        installer.place(&tgz(&[("laio", "old")]), &keg).unwrap();
        fs::write(keg.join("stale"), b"left over").unwrap();
        let installed = installer.place(&tgz(&[("laio", "new")]), &keg).unwrap();

        assert_eq!(fs::read(installed).unwrap(), b"new");
        assert!(!keg.join("stale").exists());
    }

    #[test]
    fn test_binary_outside_keg_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let keg = dir.path().join("Cellar/laio/0.10.0");
        let outside = dir.path().join("outside/evil");

        for binary in [outside.to_str().unwrap(), "../../evil", "bin/laio"] {
            let err = KegInstaller::new(binary).place(b"raw", &keg).unwrap_err();
            assert!(matches!(err, InstallError::InvalidBinary(_)), "{err}");
        }
        assert!(!outside.exists());
        assert!(!keg.exists());
    }
}

// Test helpers shared by the integration tests
// Scripted collaborators and isolated install prefixes; nothing here touches
// the network or the real Homebrew prefix.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use steep::digest::{ContentHasher, DigestAlgorithm};
use steep::install::{InstallError, Installer};
use steep::manifest::{EntrySpec, ReleaseManifest};
use steep::transport::{Transport, TransportError};
use tempfile::TempDir;
use url::Url;

pub const INTEL_REASON: &str = "Intel Macs are no longer supported";
pub const LAIO_ARM_URL: &str =
    "https://github.com/ck3mp3r/laio-cli/releases/download/v0.10.0/laio-0.10.0-aarch64-darwin.tgz";
pub const LAIO_LINUX_URL: &str =
    "https://github.com/ck3mp3r/laio-cli/releases/download/v0.10.0/laio-0.10.0-x86_64-linux.tgz";

/// Isolated install prefix, removed when dropped
///
/// - temp/
///   - Cellar/   (kegs)
///   - bin/      (links)
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub prefix: PathBuf,
    pub cellar: PathBuf,
    pub bin: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let prefix = temp_dir.path().to_path_buf();
        let cellar = prefix.join("Cellar");
        let bin = prefix.join("bin");

        std::fs::create_dir_all(&cellar).unwrap();
        std::fs::create_dir_all(&bin).unwrap();

        Self {
            temp_dir,
            prefix,
            cellar,
            bin,
        }
    }

    /// Write a file into the sandbox and return its path
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.prefix.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    DigestAlgorithm::Sha256.hash(bytes).to_string()
}

/// A gzip tarball holding one file
pub fn tgz(name: &str, contents: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, name, contents).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// laio 0.10.0 with Apple Silicon and Linux x86_64 artifacts and Intel Macs
/// marked unsupported
pub fn laio_manifest(arm_digest: &str, linux_digest: &str) -> ReleaseManifest {
    ReleaseManifest::build(
        "0.10.0",
        vec![
            EntrySpec::unsupported("macos", "x86_64", INTEL_REASON),
            EntrySpec::available("macos", "aarch64", LAIO_ARM_URL, arm_digest),
            EntrySpec::available("linux", "x86_64", LAIO_LINUX_URL, linux_digest),
        ],
    )
    .expect("valid manifest")
}

pub fn connection_reset(url: &str) -> TransportError {
    TransportError::Connection {
        url: url.to_string(),
        reason: "connection reset by peer".to_string(),
    }
}

/// Transport that replays a script of responses, then repeats a fallback
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
    fallback: Result<Vec<u8>, TransportError>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn serving(bytes: &[u8]) -> Self {
        Self::failing_then(0, bytes)
    }

    /// Fail `failures` times with a connection reset, then serve `bytes`
    pub fn failing_then(failures: usize, bytes: &[u8]) -> Self {
        let script = (0..failures)
            .map(|_| Err(connection_reset("scripted")))
            .collect();
        Self {
            script: Mutex::new(script),
            fallback: Ok(bytes.to_vec()),
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn always(error: TransportError) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(error),
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn fetch(&self, locator: &Url) -> Result<Vec<u8>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(locator.to_string());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Installer that records every call instead of touching disk.
/// Clones share one call log.
#[derive(Clone, Default)]
pub struct RecordingInstaller {
    calls: Arc<Mutex<Vec<(Vec<u8>, PathBuf)>>>,
    fail: bool,
}

impl RecordingInstaller {
    pub fn failing() -> Self {
        Self {
            calls: Arc::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<(Vec<u8>, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Installer for RecordingInstaller {
    fn place(&self, bytes: &[u8], destination: &Path) -> Result<PathBuf, InstallError> {
        self.calls
            .lock()
            .unwrap()
            .push((bytes.to_vec(), destination.to_path_buf()));
        if self.fail {
            return Err(InstallError::Io(std::io::Error::other("disk full")));
        }
        Ok(destination.join("bin").join("laio"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creates_directories() {
        let env = TestEnvironment::new();
        assert!(env.cellar.exists());
        assert!(env.bin.exists());
    }

    #[test]
    fn test_environment_cleanup() {
        let cellar = {
            let env = TestEnvironment::new();
            env.cellar.clone()
        };
        assert!(!cellar.exists());
    }

    #[tokio::test]
    async fn test_scripted_transport_replays_script() {
        let transport = ScriptedTransport::failing_then(1, b"ok");
        let url = Url::parse(LAIO_LINUX_URL).unwrap();
        assert!(transport.fetch(&url).await.is_err());
        assert_eq!(transport.fetch(&url).await.unwrap(), b"ok");
        assert_eq!(transport.fetch(&url).await.unwrap(), b"ok");
        assert_eq!(transport.calls(), 3);
    }
}

//! Resolution, download, verification and installation of release artifacts.
//!
//! An install moves through four states, each represented by its own type:
//!
//! ```text
//! Start ──resolve──▶ Resolved ──fetch──▶ Fetched ──verify──▶ Verified ──install──▶ Ready
//!   │                   │                   │                    │
//!   └── Unsupported     └── Fetch/Cancelled └── Integrity        └── Install
//! ```
//!
//! Each step consumes the previous state, so bytes that failed verification
//! cannot reach an installer, and an [`Installer`] only ever sees a
//! [`Verified`] value.
//!
//! - **resolve** is a pure manifest lookup and never touches the network.
//! - **fetch** is the only suspension point. Transport errors are retried
//!   with exponential backoff up to [`RetryPolicy::max_retries`]; the
//!   caller's [`CancellationToken`] aborts a download or a backoff sleep.
//! - **verify** hashes the bytes with the manifest's algorithm and compares
//!   digests without early exit. A mismatch is final: it is never re-fetched.
//! - **install** runs the installer once on the blocking pool, serialized
//!   per destination path.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use steep::config::Settings;
//! use steep::install::KegInstaller;
//! use steep::manifest::ReleaseManifest;
//! use steep::platform::Platform;
//! use steep::resolver::Resolver;
//! use steep::transport::HttpTransport;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env();
//!     let manifest = Arc::new(ReleaseManifest::load("laio.json".as_ref())?);
//!     let resolver = Resolver::new(HttpTransport::new(settings.timeout)?, &settings);
//!
//!     let platform = Platform::detect().expect("supported host");
//!     let keg = settings.keg(manifest.name(), &manifest.version().to_string());
//!     let installer = KegInstaller::new(manifest.binary());
//!     let ready = resolver
//!         .run(&manifest, platform, &installer, &keg, &CancellationToken::new())
//!         .await?;
//!
//!     println!("installed {}", ready.installed().display());
//!     Ok(())
//! }
//! ```

use crate::config::{DEFAULT_TIMEOUT, RetryPolicy, Settings};
use crate::digest::{ContentHasher, HexDigest};
use crate::error::{Result, SteepError};
use crate::install::{InstallError, Installer};
use crate::manifest::{Lookup, PlatformEntry, ReleaseManifest};
use crate::platform::Platform;
use crate::transport::{Transport, TransportError};
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A manifest entry selected for a platform.
#[derive(Debug, Clone)]
pub struct Resolved {
    manifest: Arc<ReleaseManifest>,
    entry: PlatformEntry,
}

impl Resolved {
    pub fn manifest(&self) -> &Arc<ReleaseManifest> {
        &self.manifest
    }

    pub fn entry(&self) -> &PlatformEntry {
        &self.entry
    }
}

/// Downloaded, not yet trusted, artifact bytes.
#[derive(Debug)]
pub struct Fetched {
    resolved: Resolved,
    bytes: Vec<u8>,
}

impl Fetched {
    /// Wrap bytes obtained outside the transport, e.g. a file already on
    /// disk, so they can go through [`verify`].
    pub fn local(resolved: Resolved, bytes: Vec<u8>) -> Self {
        Self { resolved, bytes }
    }

    pub fn resolved(&self) -> &Resolved {
        &self.resolved
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Artifact bytes whose digest matched the manifest.
#[derive(Debug)]
pub struct Verified {
    resolved: Resolved,
    bytes: Vec<u8>,
}

impl Verified {
    pub fn resolved(&self) -> &Resolved {
        &self.resolved
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A completed install.
#[derive(Debug, Clone)]
pub struct Ready {
    resolved: Resolved,
    destination: PathBuf,
    installed: PathBuf,
}

impl Ready {
    pub fn entry(&self) -> &PlatformEntry {
        &self.resolved.entry
    }

    pub fn name(&self) -> &str {
        self.resolved.manifest.name()
    }

    pub fn version(&self) -> &Version {
        self.resolved.manifest.version()
    }

    pub fn depends_on(&self) -> &[String] {
        &self.resolved.manifest.package().depends_on
    }

    /// The keg directory the installer wrote to.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// The installed entry point reported by the installer.
    pub fn installed(&self) -> &Path {
        &self.installed
    }
}

/// Outcome of checking a single entry with [`Resolver::check_all`].
#[derive(Debug)]
pub struct CheckOutcome {
    pub platform: Platform,
    pub locator: String,
    pub result: Result<HexDigest>,
}

/// Select the entry for `platform`.
///
/// Undeclared platforms and explicit markers both fail with
/// [`SteepError::UnsupportedPlatform`]; only markers carry a reason.
pub fn resolve(manifest: &Arc<ReleaseManifest>, platform: Platform) -> Result<Resolved> {
    match manifest.lookup(platform.os, platform.arch) {
        Lookup::Found(entry) => {
            debug!(%platform, locator = %entry.locator, "resolved");
            Ok(Resolved {
                manifest: Arc::clone(manifest),
                entry: entry.clone(),
            })
        }
        Lookup::Unsupported(marker) => Err(SteepError::UnsupportedPlatform {
            platform: platform.to_string(),
            reason: Some(marker.reason.clone()),
        }),
        Lookup::NotFound => Err(SteepError::UnsupportedPlatform {
            platform: platform.to_string(),
            reason: None,
        }),
    }
}

/// Like [`resolve`], from raw OS and architecture identifiers.
///
/// Identifiers the engine does not recognize resolve as not found.
pub fn resolve_named(manifest: &Arc<ReleaseManifest>, os: &str, arch: &str) -> Result<Resolved> {
    match Platform::from_names(os, arch) {
        Some(platform) => resolve(manifest, platform),
        None => Err(SteepError::UnsupportedPlatform {
            platform: format!("{os}/{arch}"),
            reason: None,
        }),
    }
}

/// Check fetched bytes against the declared digest.
///
/// On mismatch the bytes are dropped with the error.
pub fn verify(fetched: Fetched) -> Result<Verified> {
    let Fetched { resolved, bytes } = fetched;
    let expected = &resolved.entry.digest;
    let actual = resolved.manifest.algorithm().hash(&bytes);

    if !actual.matches(expected) {
        warn!(
            platform = %resolved.entry.platform,
            %expected,
            %actual,
            "digest mismatch, discarding download"
        );
        return Err(SteepError::Integrity {
            platform: resolved.entry.platform.to_string(),
            locator: resolved.entry.locator.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    debug!(platform = %resolved.entry.platform, digest = %actual, "verified");
    Ok(Verified { resolved, bytes })
}

/// Mutexes keyed by install destination.
#[derive(Clone)]
struct InstallLocks {
    locks: moka::future::Cache<PathBuf, Arc<Mutex<()>>>,
}

impl InstallLocks {
    fn new() -> Self {
        // Unbounded: evicting a held lock would let a second install in.
        Self {
            locks: moka::future::Cache::builder().build(),
        }
    }

    async fn lock_for(&self, destination: &Path) -> Arc<Mutex<()>> {
        self.locks
            .get_with(destination.to_path_buf(), async { Arc::new(Mutex::new(())) })
            .await
    }
}

/// Drives artifacts from manifest to install over a [`Transport`].
#[derive(Clone)]
pub struct Resolver<T> {
    transport: T,
    retry: RetryPolicy,
    timeout: Duration,
    locks: InstallLocks,
}

impl<T: Transport> Resolver<T> {
    pub fn new(transport: T, settings: &Settings) -> Self {
        Self {
            transport,
            retry: settings.retry,
            timeout: settings.timeout,
            locks: InstallLocks::new(),
        }
    }

    /// A resolver with an explicit retry policy and the default timeout.
    pub fn with_retry(transport: T, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            timeout: DEFAULT_TIMEOUT,
            locks: InstallLocks::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Download the resolved artifact, retrying transport failures.
    pub async fn fetch(&self, resolved: Resolved, cancel: &CancellationToken) -> Result<Fetched> {
        let locator = resolved.entry.locator.clone();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(&locator)),
                outcome = tokio::time::timeout(self.timeout, self.transport.fetch(&locator)) => outcome,
            };

            let err = match outcome {
                Ok(Ok(bytes)) => {
                    info!(%locator, bytes = bytes.len(), attempt, "fetched");
                    return Ok(Fetched { resolved, bytes });
                }
                Ok(Err(err)) => err,
                Err(_) => TransportError::Timeout {
                    url: locator.to_string(),
                },
            };

            if attempt > self.retry.max_retries {
                return Err(SteepError::Fetch {
                    locator: locator.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = self.retry.delay_for(attempt - 1);
            warn!(
                %locator,
                attempt,
                max_attempts = self.retry.max_retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient fetch failure, backing off"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(&locator)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Hand verified bytes to `installer`, exactly once.
    ///
    /// Concurrent installs to the same destination are serialized; different
    /// destinations proceed in parallel.
    pub async fn install<I>(
        &self,
        verified: Verified,
        installer: &I,
        destination: &Path,
    ) -> Result<Ready>
    where
        I: Installer + Clone + 'static,
    {
        let lock = self.locks.lock_for(destination).await;
        let _guard = lock.lock().await;

        let Verified { resolved, bytes } = verified;
        let install_error = |source: InstallError| SteepError::Install {
            destination: destination.to_path_buf(),
            source,
        };

        let installer = installer.clone();
        let target = destination.to_path_buf();
        let installed = tokio::task::spawn_blocking(move || installer.place(&bytes, &target))
            .await
            .map_err(|e| install_error(InstallError::Interrupted(e.to_string())))?
            .map_err(install_error)?;

        info!(
            platform = %resolved.entry.platform,
            installed = %installed.display(),
            "installed"
        );
        Ok(Ready {
            resolved,
            destination: destination.to_path_buf(),
            installed,
        })
    }

    /// Resolve, fetch and verify without installing.
    pub async fn fetch_verified(
        &self,
        manifest: &Arc<ReleaseManifest>,
        platform: Platform,
        cancel: &CancellationToken,
    ) -> Result<Verified> {
        let resolved = resolve(manifest, platform)?;
        let fetched = self.fetch(resolved, cancel).await?;
        verify(fetched)
    }

    /// The whole pipeline, from manifest to [`Ready`].
    pub async fn run<I>(
        &self,
        manifest: &Arc<ReleaseManifest>,
        platform: Platform,
        installer: &I,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<Ready>
    where
        I: Installer + Clone + 'static,
    {
        let verified = self.fetch_verified(manifest, platform, cancel).await?;
        self.install(verified, installer, destination).await
    }

    /// Fetch and verify every downloadable entry concurrently.
    pub async fn check_all(
        &self,
        manifest: &Arc<ReleaseManifest>,
        cancel: &CancellationToken,
    ) -> Vec<CheckOutcome> {
        let checks = manifest.entries().map(|entry| {
            let platform = entry.platform;
            let locator = entry.locator.to_string();
            async move {
                let result = self
                    .fetch_verified(manifest, platform, cancel)
                    .await
                    .map(|verified| verified.resolved.entry.digest.clone());
                CheckOutcome {
                    platform,
                    locator,
                    result,
                }
            }
        });
        futures::future::join_all(checks).await
    }
}

fn cancelled(locator: &url::Url) -> SteepError {
    debug!(%locator, "fetch cancelled");
    SteepError::Cancelled {
        locator: locator.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestAlgorithm;
    use crate::manifest::EntrySpec;
    use crate::platform::{Arch, Os};
    use std::sync::atomic::{AtomicU32, Ordering};

    const BODY: &[u8] = b"laio binary";

    fn manifest() -> Arc<ReleaseManifest> {
        let digest = DigestAlgorithm::Sha256.hash(BODY);
        Arc::new(
            ReleaseManifest::build(
                "0.10.0",
                vec![EntrySpec::available(
                    "linux",
                    "x86_64",
                    "https://example.org/laio.tgz",
                    digest.as_str(),
                )],
            )
            .unwrap(),
        )
    }

    /// Never completes; used to exercise timeouts and cancellation.
    struct Hanging;

    impl Transport for Hanging {
        async fn fetch(&self, _locator: &url::Url) -> std::result::Result<Vec<u8>, TransportError> {
            std::future::pending().await
        }
    }

    /// Resets the connection on every call.
    struct Resetting(AtomicU32);

    impl Transport for Resetting {
        async fn fetch(&self, locator: &url::Url) -> std::result::Result<Vec<u8>, TransportError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Connection {
                url: locator.to_string(),
                reason: "connection reset by peer".to_string(),
            })
        }
    }

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::X86_64)
    }

    #[tokio::test]
    async fn test_timeout_is_retried_then_reported() {
        let resolver =
            Resolver::with_retry(Hanging, RetryPolicy::immediate(1)).timeout(Duration::from_millis(10));
        let resolved = resolve(&manifest(), linux()).unwrap();

        let err = resolver
            .fetch(resolved, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            SteepError::Fetch {
                attempts, source, ..
            } => {
                assert_eq!(attempts, 2);
                assert!(matches!(source, TransportError::Timeout { .. }));
            }
            other => panic!("expected fetch error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_during_fetch() {
        let resolver = Resolver::with_retry(Hanging, RetryPolicy::immediate(3));
        let resolved = resolve(&manifest(), linux()).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = resolver.fetch(resolved, &cancel).await.unwrap_err();
        assert!(matches!(err, SteepError::Cancelled { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_cancellation_during_backoff() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        };
        let resolver = Resolver::with_retry(Resetting(AtomicU32::new(0)), policy);
        let resolved = resolve(&manifest(), linux()).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = resolver.fetch(resolved, &cancel).await.unwrap_err();
        assert!(matches!(err, SteepError::Cancelled { .. }), "{err}");
        assert_eq!(resolver.transport().0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_calls_transport() {
        let resolver = Resolver::with_retry(Resetting(AtomicU32::new(0)), RetryPolicy::immediate(3));
        let resolved = resolve(&manifest(), linux()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver.fetch(resolved, &cancel).await.unwrap_err();
        assert!(matches!(err, SteepError::Cancelled { .. }));
        assert_eq!(resolver.transport().0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_retries_means_one_attempt() {
        let resolver = Resolver::with_retry(Resetting(AtomicU32::new(0)), RetryPolicy::immediate(0));
        let resolved = resolve(&manifest(), linux()).unwrap();

        let err = resolver
            .fetch(resolved, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SteepError::Fetch { attempts: 1, .. }), "{err}");
        assert_eq!(resolver.transport().0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolve_named_32bit_arm_is_not_found() {
        let digest = DigestAlgorithm::Sha256.hash(BODY);
        let manifest = Arc::new(
            ReleaseManifest::build(
                "0.10.0",
                vec![EntrySpec::available(
                    "linux",
                    "aarch64",
                    "https://example.org/laio-aarch64.tgz",
                    digest.as_str(),
                )],
            )
            .unwrap(),
        );

        assert!(resolve_named(&manifest, "linux", "aarch64").is_ok());
        let err = resolve_named(&manifest, "linux", "arm").unwrap_err();
        assert!(
            matches!(err, SteepError::UnsupportedPlatform { reason: None, .. }),
            "{err}"
        );
    }

    #[test]
    fn test_resolve_named_unknown_arch() {
        let err = resolve_named(&manifest(), "linux", "riscv64").unwrap_err();
        match err {
            SteepError::UnsupportedPlatform { platform, reason } => {
                assert_eq!(platform, "linux/riscv64");
                assert_eq!(reason, None);
            }
            other => panic!("unexpected {other}"),
        }
    }
}

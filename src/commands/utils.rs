use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use steep::history::ReleaseHistory;
use steep::manifest::ReleaseManifest;
use steep::platform::Platform;
use steep::{Result, SteepError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Which release and platform a command operates on.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Manifest file, release history file, or directory of manifests
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Release version (defaults to the latest release)
    #[arg(long = "release", value_name = "VERSION")]
    pub release: Option<String>,

    /// Target operating system (defaults to this host)
    #[arg(long)]
    pub os: Option<String>,

    /// Target CPU architecture (defaults to this host)
    #[arg(long)]
    pub arch: Option<String>,
}

impl TargetArgs {
    /// Load the manifest and pick the requested release.
    pub fn release(&self) -> Result<Arc<ReleaseManifest>> {
        let history = ReleaseHistory::load(&self.manifest)?;
        let manifest = history.select(self.release.as_deref())?;
        debug!(
            name = manifest.name(),
            version = %manifest.version(),
            "selected release"
        );
        Ok(manifest)
    }

    /// The requested platform, filling gaps from the host.
    ///
    /// Unrecognized identifiers are reported as an unsupported platform
    /// rather than mapped to a default.
    pub fn platform(&self) -> Result<Platform> {
        let os = self.os.as_deref().unwrap_or(std::env::consts::OS);
        let arch = self.arch.as_deref().unwrap_or(std::env::consts::ARCH);
        Platform::from_names(os, arch).ok_or_else(|| SteepError::UnsupportedPlatform {
            platform: format!("{os}/{arch}"),
            reason: None,
        })
    }
}

/// A token cancelled when the user presses Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling");
            trigger.cancel();
        }
    });
    token
}

/// File name of the last URL path segment, for default output paths.
pub fn file_name_from_url(url: &url::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("artifact")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use steep::platform::{Arch, Os};

    fn args(os: Option<&str>, arch: Option<&str>) -> TargetArgs {
        TargetArgs {
            manifest: PathBuf::from("laio.json"),
            release: None,
            os: os.map(String::from),
            arch: arch.map(String::from),
        }
    }

    #[test]
    fn test_explicit_platform() {
        let platform = args(Some("darwin"), Some("arm64")).platform().unwrap();
        assert_eq!(platform, Platform::new(Os::Macos, Arch::Aarch64));
    }

    #[test]
    fn test_unknown_platform_is_unsupported() {
        let err = args(Some("linux"), Some("sparc64")).platform().unwrap_err();
        assert!(matches!(err, SteepError::UnsupportedPlatform { reason: None, .. }));
    }

    #[test]
    fn test_file_name_from_url() {
        let url = url::Url::parse("https://example.org/download/laio-0.10.0-x86_64-linux.tgz")
            .unwrap();
        assert_eq!(file_name_from_url(&url), "laio-0.10.0-x86_64-linux.tgz");
        let url = url::Url::parse("https://example.org/").unwrap();
        assert_eq!(file_name_from_url(&url), "artifact");
    }
}

use crate::install::InstallError;
use crate::transport::TransportError;
use std::path::PathBuf;
use thiserror::Error;

/// Process exit codes reported by the `steep` binary.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const UNSUPPORTED_PLATFORM: i32 = 1;
    pub const INTEGRITY: i32 = 2;
    pub const TRANSPORT: i32 = 3;
    pub const INSTALL: i32 = 4;
    pub const OTHER: i32 = 5;
}

#[derive(Error, Debug)]
pub enum SteepError {
    #[error("duplicate platform {platform} in manifest {version}")]
    DuplicatePlatform { version: String, platform: String },

    #[error("malformed digest for {platform}: {reason}")]
    MalformedDigest { platform: String, reason: String },

    #[error("invalid release version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("invalid locator for {platform}: {reason}")]
    InvalidLocator { platform: String, reason: String },

    #[error("unknown platform {os}/{arch} declared in manifest")]
    UnknownPlatform { os: String, arch: String },

    #[error("invalid package {field} '{value}': must be a single file name")]
    InvalidPackage { field: &'static str, value: String },

    #[error("unsupported manifest format version {0}")]
    UnsupportedFormat(u32),

    #[error("release {0} already exists in history")]
    DuplicateRelease(String),

    #[error("release {version} is older than latest release {latest}")]
    OutOfOrderRelease { version: String, latest: String },

    #[error("release {0} not found")]
    ReleaseNotFound(String),

    #[error("unsupported platform {platform}{}", reason_suffix(.reason))]
    UnsupportedPlatform {
        platform: String,
        reason: Option<String>,
    },

    #[error("failed to fetch {locator} after {attempts} attempt(s): {source}")]
    Fetch {
        locator: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("fetch of {locator} was cancelled")]
    Cancelled { locator: String },

    #[error(
        "integrity check failed for {platform} ({locator}): expected {expected}, got {actual}"
    )]
    Integrity {
        platform: String,
        locator: String,
        expected: String,
        actual: String,
    },

    #[error("install to {} failed: {source}", .destination.display())]
    Install {
        destination: PathBuf,
        #[source]
        source: InstallError,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SteepError {
    /// Exit code the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SteepError::UnsupportedPlatform { .. } => exit_code::UNSUPPORTED_PLATFORM,
            SteepError::Integrity { .. } => exit_code::INTEGRITY,
            SteepError::Fetch { .. } | SteepError::Cancelled { .. } => exit_code::TRANSPORT,
            SteepError::Install { .. } => exit_code::INSTALL,
            _ => exit_code::OTHER,
        }
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, SteepError>;

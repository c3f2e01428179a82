//! Runtime settings.
//!
//! Settings come from the environment and can be overridden per invocation
//! by CLI flags:
//!
//! | Variable               | Default                                 |
//! |------------------------|-----------------------------------------|
//! | `STEEP_PREFIX`         | `HOMEBREW_PREFIX`, else per-arch prefix |
//! | `STEEP_MAX_RETRIES`    | `3`                                     |
//! | `STEEP_RETRY_DELAY_MS` | `500`                                   |
//! | `STEEP_TIMEOUT_SECS`   | `30`                                    |
//!
//! Malformed values are logged and replaced by the default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry bound and backoff schedule for transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_DELAY,
            max_delay: MAX_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately; used by tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let multiplier = 1u32 << retry.min(16);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub prefix: PathBuf,
    pub retry: RetryPolicy,
    /// Per-attempt fetch timeout.
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, so tests need not touch the real
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let prefix = lookup("STEEP_PREFIX")
            .or_else(|| lookup("HOMEBREW_PREFIX"))
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_prefix);

        let max_retries = parse_var(&lookup, "STEEP_MAX_RETRIES").unwrap_or(DEFAULT_MAX_RETRIES);
        let base_delay = parse_var::<u64>(&lookup, "STEEP_RETRY_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_DELAY);
        let timeout = parse_var::<u64>(&lookup, "STEEP_TIMEOUT_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        Self {
            prefix,
            retry: RetryPolicy {
                max_retries,
                base_delay,
                max_delay: MAX_RETRY_DELAY.max(base_delay),
            },
            timeout,
        }
    }

    /// Directory holding versioned kegs: `<prefix>/Cellar`.
    pub fn cellar(&self) -> PathBuf {
        self.prefix.join("Cellar")
    }

    /// Keg directory for one release of a package.
    pub fn keg(&self, name: &str, version: &str) -> PathBuf {
        self.cellar().join(name).join(version)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed setting");
            None
        }
    }
}

fn default_prefix() -> PathBuf {
    #[cfg(target_arch = "aarch64")]
    {
        PathBuf::from("/opt/homebrew")
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        PathBuf::from("/usr/local")
    }
}

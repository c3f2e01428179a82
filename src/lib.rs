//! Library interface for steep
//!
//! Resolves the right artifact for a platform from a release manifest,
//! downloads it, verifies its digest and installs it into a keg.

pub mod config;
pub mod digest;
pub mod error;
pub mod history;
pub mod install;
pub mod manifest;
pub mod platform;
pub mod receipt;
pub mod resolver;
pub mod symlink;
pub mod transport;

// Re-export commonly used types
pub use error::{Result, SteepError};
pub use manifest::{Lookup, ReleaseManifest};
pub use platform::{Arch, Os, Platform};
pub use resolver::{Resolver, resolve, verify};

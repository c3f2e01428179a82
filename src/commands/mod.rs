//! Command implementations for the steep CLI
//!
//! - **resolve**: print the artifact a platform resolves to
//! - **fetch**: download and verify an artifact without installing it
//! - **install**: full resolve, fetch, verify, install pipeline
//! - **verify**: check a local file against a manifest digest
//! - **check**: fetch and verify every artifact in a release
//! - **history**: list releases and their platform support
//! - **platform**: show the detected host platform
//! - **utils**: shared helpers (internal)

pub mod check;
pub mod fetch;
pub mod history;
pub mod install;
pub mod platform;
pub mod resolve;
pub mod verify;
pub(crate) mod utils;

pub use check::check;
pub use fetch::fetch;
pub use history::history;
pub use install::install;
pub use platform::platform;
pub use resolve::resolve;
pub use verify::verify;

use crate::commands::utils::{TargetArgs, cancel_on_ctrl_c, file_name_from_url};
use colored::Colorize;
use std::path::PathBuf;
use steep::Result;
use steep::config::Settings;
use steep::resolver::Resolver;
use steep::transport::HttpTransport;

/// Download and verify an artifact, then write it to disk.
///
/// Nothing is written unless the digest matched.
pub async fn fetch(settings: &Settings, target: &TargetArgs, output: Option<PathBuf>) -> Result<()> {
    let manifest = target.release()?;
    let platform = target.platform()?;
    let transport = HttpTransport::new(settings.timeout)?.with_progress(true);
    let resolver = Resolver::new(transport, settings);

    let verified = resolver
        .fetch_verified(&manifest, platform, &cancel_on_ctrl_c())
        .await?;

    let entry = verified.resolved().entry();
    let output = output.unwrap_or_else(|| PathBuf::from(file_name_from_url(&entry.locator)));
    tokio::fs::write(&output, verified.bytes()).await?;

    println!(
        "{} Downloaded {} {} for {} to {}",
        "✓".green(),
        manifest.name().bold(),
        manifest.version(),
        platform.to_string().cyan(),
        output.display()
    );
    Ok(())
}

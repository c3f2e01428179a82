use crate::commands::utils::{TargetArgs, cancel_on_ctrl_c};
use colored::Colorize;
use steep::config::Settings;
use steep::manifest::Declaration;
use steep::resolver::Resolver;
use steep::transport::HttpTransport;
use steep::{Result, SteepError};

/// Fetch and verify every artifact in a release.
///
/// Fails with the first integrity error if any digest mismatched, otherwise
/// with the first other failure.
pub async fn check(settings: &Settings, target: &TargetArgs) -> Result<()> {
    let manifest = target.release()?;
    let transport = HttpTransport::new(settings.timeout)?;
    let resolver = Resolver::new(transport, settings);

    println!(
        "Checking {} artifacts for {} {}...",
        manifest.entries().count().to_string().bold(),
        manifest.name().bold(),
        manifest.version()
    );

    for declaration in manifest.declarations() {
        if let Declaration::Unsupported(marker) = declaration {
            println!(
                "  {} {}: {}",
                "⚠".yellow(),
                marker.platform,
                marker.reason.dimmed()
            );
        }
    }

    let outcomes = resolver.check_all(&manifest, &cancel_on_ctrl_c()).await;

    let mut integrity_failure = None;
    let mut other_failure = None;
    for outcome in outcomes {
        match outcome.result {
            Ok(digest) => println!("  {} {} {}", "✓".green(), outcome.platform, digest),
            Err(err) => {
                println!("  {} {} {}", "✗".red(), outcome.platform, err);
                let slot = if matches!(err, SteepError::Integrity { .. }) {
                    &mut integrity_failure
                } else {
                    &mut other_failure
                };
                slot.get_or_insert(err);
            }
        }
    }

    match integrity_failure.or(other_failure) {
        Some(err) => Err(err),
        None => {
            println!("{} All artifacts verified", "✓".green());
            Ok(())
        }
    }
}

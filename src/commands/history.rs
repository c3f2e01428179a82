use colored::Colorize;
use std::path::Path;
use steep::Result;
use steep::config::Settings;
use steep::history::ReleaseHistory;
use steep::manifest::{Declaration, ReleaseManifest};
use steep::receipt::{InstallReceipt, RECEIPT_FILE};
use steep::symlink;

/// List every release with its per-platform support, marking releases
/// installed under the prefix.
pub fn history(settings: &Settings, path: &Path) -> Result<()> {
    let history = ReleaseHistory::load(path)?;
    if history.is_empty() {
        println!("No releases in {}", path.display());
        return Ok(());
    }

    let latest = history.latest().map(|m| m.version().clone());
    for manifest in history.iter() {
        let marker = if Some(manifest.version()) == latest.as_ref() {
            " (latest)".green().to_string()
        } else {
            String::new()
        };
        println!("{} {}{}", manifest.name().bold(), manifest.version(), marker);
        print_install_state(settings, manifest)?;

        for declaration in manifest.declarations() {
            match declaration {
                Declaration::Available(entry) => {
                    println!("  {} {}", "✓".green(), entry.platform)
                }
                Declaration::Unsupported(unsupported) => println!(
                    "  {} {} {}",
                    "✗".red(),
                    unsupported.platform,
                    unsupported.reason.dimmed()
                ),
            }
        }
    }
    Ok(())
}

fn print_install_state(settings: &Settings, manifest: &ReleaseManifest) -> Result<()> {
    let keg = settings.keg(manifest.name(), &manifest.version().to_string());
    if !keg.join(RECEIPT_FILE).exists() {
        return Ok(());
    }

    let receipt = InstallReceipt::read(&keg)?;
    let linked = symlink::resolve_link(&settings.bin_dir().join(manifest.binary()))
        .is_ok_and(|target| target.starts_with(&keg));
    println!(
        "  {} installed {} for {}/{}{}",
        "●".cyan(),
        receipt.installed_at(),
        receipt.os,
        receipt.arch,
        if linked { " (linked)" } else { "" }
    );
    Ok(())
}

use crate::commands::utils::{TargetArgs, cancel_on_ctrl_c};
use colored::Colorize;
use steep::config::Settings;
use steep::install::{InstallError, KegInstaller};
use steep::receipt::InstallReceipt;
use steep::resolver::Resolver;
use steep::symlink;
use steep::transport::HttpTransport;
use steep::{Result, SteepError};

/// Resolve, fetch, verify and install a release into the prefix.
pub async fn install(settings: &Settings, target: &TargetArgs, link: bool) -> Result<()> {
    let manifest = target.release()?;
    let platform = target.platform()?;

    println!(
        "Installing {} {} for {}...",
        manifest.name().bold(),
        manifest.version(),
        platform.to_string().cyan()
    );

    let transport = HttpTransport::new(settings.timeout)?.with_progress(true);
    let resolver = Resolver::new(transport, settings);
    let keg = settings.keg(manifest.name(), &manifest.version().to_string());
    let installer = KegInstaller::new(manifest.binary());

    let ready = resolver
        .run(&manifest, platform, &installer, &keg, &cancel_on_ctrl_c())
        .await?;

    let post_install = |e: anyhow::Error| SteepError::Install {
        destination: ready.destination().to_path_buf(),
        source: InstallError::PostInstall(format!("{e:#}")),
    };

    InstallReceipt::for_ready(&ready)
        .write(ready.destination())
        .map_err(post_install)?;

    if link {
        let linked = symlink::link_binary(&settings.prefix, ready.installed()).map_err(post_install)?;
        println!("  {} Linked {}", "✓".green(), linked.display());
    }

    println!(
        "{} Installed {} {} to {}",
        "✓".green(),
        ready.name().bold(),
        ready.version(),
        ready.destination().display()
    );

    if !ready.depends_on().is_empty() {
        println!(
            "  {} {} requires: {}",
            "⚠".yellow(),
            ready.name(),
            ready.depends_on().join(", ").bold()
        );
    }
    Ok(())
}

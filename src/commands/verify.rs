use crate::commands::utils::TargetArgs;
use colored::Colorize;
use std::path::Path;
use steep::Result;
use steep::resolver::Fetched;

/// Check a file already on disk against the manifest digest.
pub fn verify(target: &TargetArgs, file: &Path) -> Result<()> {
    let manifest = target.release()?;
    let platform = target.platform()?;
    let resolved = steep::resolve(&manifest, platform)?;
    let bytes = std::fs::read(file)?;

    let verified = steep::verify(Fetched::local(resolved, bytes))?;
    println!(
        "{} {} matches {} {} for {} ({})",
        "✓".green(),
        file.display(),
        manifest.name().bold(),
        manifest.version(),
        platform.to_string().cyan(),
        verified.resolved().entry().digest
    );
    Ok(())
}

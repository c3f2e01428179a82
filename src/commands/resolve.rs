use crate::commands::utils::TargetArgs;
use steep::Result;

/// Print the locator and digest a platform resolves to.
///
/// Output mirrors a formula's `url` / `sha256` stanzas so it can be pasted
/// or parsed line by line.
pub fn resolve(target: &TargetArgs) -> Result<()> {
    let manifest = target.release()?;
    let platform = target.platform()?;
    let resolved = steep::resolve(&manifest, platform)?;
    let entry = resolved.entry();

    println!("url {}", entry.locator);
    println!("{} {}", entry.digest.algorithm(), entry.digest);
    Ok(())
}

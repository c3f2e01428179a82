//! Linking installed binaries into `<prefix>/bin`.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Link `<prefix>/bin/<name>` to `binary` inside a keg.
///
/// The link is relative when the keg lives under the prefix
/// (`../Cellar/laio/0.10.0/bin/laio`), so the whole prefix can be moved.
/// An existing symlink is replaced; a regular file is never overwritten.
#[cfg(unix)]
pub fn link_binary(prefix: &Path, binary: &Path) -> Result<PathBuf> {
    let name = binary
        .file_name()
        .with_context(|| format!("Not a file path: {}", binary.display()))?;
    let bin_dir = prefix.join("bin");
    fs::create_dir_all(&bin_dir)
        .with_context(|| format!("Failed to create directory: {}", bin_dir.display()))?;

    let link = bin_dir.join(name);
    if let Ok(meta) = link.symlink_metadata() {
        if !meta.file_type().is_symlink() {
            bail!(
                "Refusing to overwrite {}: not a symlink",
                link.display()
            );
        }
        fs::remove_file(&link)
            .with_context(|| format!("Failed to remove old link: {}", link.display()))?;
    }

    let target = match binary.strip_prefix(prefix) {
        Ok(rel) => Path::new("..").join(rel),
        Err(_) => binary.to_path_buf(),
    };
    std::os::unix::fs::symlink(&target, &link).with_context(|| {
        format!(
            "Failed to create symlink: {} -> {}",
            link.display(),
            target.display()
        )
    })?;

    Ok(link)
}

#[cfg(not(unix))]
pub fn link_binary(_prefix: &Path, binary: &Path) -> Result<PathBuf> {
    bail!("Linking is only supported on unix: {}", binary.display())
}

/// Resolve a link target the way the filesystem would, without touching disk.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Where `link` points, as an absolute, normalized path.
pub fn resolve_link(link: &Path) -> Result<PathBuf> {
    let target = fs::read_link(link)
        .with_context(|| format!("Failed to read link: {}", link.display()))?;
    let joined = match link.parent() {
        Some(parent) if target.is_relative() => parent.join(target),
        _ => target,
    };
    Ok(normalize_path(&joined))
}

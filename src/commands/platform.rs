use steep::platform::Platform;
use steep::{Result, SteepError};

/// Print the platform this host resolves as.
pub fn platform() -> Result<()> {
    let detected = Platform::detect().ok_or_else(|| SteepError::UnsupportedPlatform {
        platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        reason: Some("host platform is not recognized".to_string()),
    })?;
    println!("{detected}");
    Ok(())
}

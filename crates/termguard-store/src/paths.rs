//! Path resolution for the TermGuard configuration directory.

use anyhow::Result;
use std::path::PathBuf;

const TERMGUARD_DIR: &str = ".termguard";
const CONFIG_FILE: &str = "config.json";

/// Environment variable to override the TermGuard directory.
const TERMGUARD_DIR_ENV: &str = "TERMGUARD_DIR";

/// Resolve the TermGuard configuration directory.
/// Priority: TERMGUARD_DIR env var > ~/.termguard/
pub fn resolve_termguard_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(TERMGUARD_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(TERMGUARD_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Get the default config path: ~/.termguard/config.json
pub fn default_config_path() -> Result<PathBuf> {
    Ok(resolve_termguard_dir()?.join(CONFIG_FILE))
}

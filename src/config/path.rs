//! Path helpers for the config file and the settings store.
//!
//! Supports absolute paths, paths relative to the config file, and "~" home
//! directory expansion.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{PfError, Result};

/// Directory name under the platform config and data directories.
pub const APP_DIR: &str = "pixy-fleet";

/// Resolve a path written in a config file.
///
/// Resolution rules:
/// 1. Paths starting with `~`: expanded to home directory
/// 2. Absolute paths: used as-is
/// 3. Relative paths: resolved relative to the config file's directory
pub fn resolve_path(path: &Path, config_dir: &Path) -> Result<PathBuf> {
    trace!(
        path = %path.display(),
        config_dir = %config_dir.display(),
        "Resolving path"
    );

    let path_str = path.to_string_lossy();

    if path_str == "~" || path_str.starts_with("~/") {
        let home = home_dir()?;
        let rest = path_str.strip_prefix("~/").unwrap_or("");
        let resolved = if rest.is_empty() { home } else { home.join(rest) };
        debug!(
            original = %path.display(),
            resolved = %resolved.display(),
            "Expanded home directory path"
        );
        return Ok(resolved);
    }

    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let resolved = config_dir.join(path);
    debug!(
        original = %path.display(),
        resolved = %resolved.display(),
        "Resolved relative path"
    );
    Ok(resolved)
}

/// Resolve the user's home directory (cross-platform).
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| PfError::ConfigInvalid("Could not determine home directory".to_string()))
}

/// Default config file location.
///
/// Location: `~/.config/pixy-fleet/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        PfError::ConfigInvalid("Could not determine config directory".to_string())
    })?;
    Ok(config_dir.join(APP_DIR).join("config.toml"))
}

/// Default settings store location.
///
/// Location: `~/.local/share/pixy-fleet/settings.json`
pub fn default_store_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir().ok_or_else(|| {
        PfError::Other("Could not determine local data directory".to_string())
    })?;
    Ok(data_dir.join(APP_DIR).join("settings.json"))
}

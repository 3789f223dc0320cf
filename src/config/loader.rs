//! Loading and saving the TOML config file.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, trace};

use super::path::{default_config_path, default_store_path, resolve_path};
use super::schema::FleetConfig;
use crate::error::{PfError, Result};

/// A validated configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: FleetConfig,
    /// File the config was read from; `None` when built-in defaults are used.
    pub source: Option<PathBuf>,
}

impl LoadedConfig {
    /// Settings store path with relative paths resolved against the config
    /// file's directory.
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.config.store_path {
            Some(path) => {
                let base = self
                    .source
                    .as_deref()
                    .and_then(Path::parent)
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
                resolve_path(path, &base)
            }
            None => default_store_path(),
        }
    }
}

/// Locate and load the effective configuration.
///
/// An explicit path must exist. Without one the default location is tried,
/// falling back to built-in defaults if nothing is there.
#[instrument(skip_all, fields(explicit = ?explicit))]
pub fn load_effective(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        return Ok(LoadedConfig {
            config: load_config(path)?,
            source: Some(path.to_path_buf()),
        });
    }

    match default_config_path() {
        Ok(path) if path.exists() => Ok(LoadedConfig {
            config: load_config(&path)?,
            source: Some(path),
        }),
        _ => {
            info!("No config file found, using built-in defaults");
            Ok(LoadedConfig {
                config: FleetConfig::default(),
                source: None,
            })
        }
    }
}

/// Load and validate a config file.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FleetConfig> {
    let path = path.as_ref();
    info!("Loading configuration file");

    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PfError::ConfigNotFound {
                path: path.display().to_string(),
            }
        } else {
            PfError::Io(e)
        }
    })?;
    debug!(bytes = content.len(), "Read config file");

    load_config_from_str(&content)
}

/// Parse and validate TOML config text.
#[instrument(skip(content), fields(content_len = content.len()))]
pub fn load_config_from_str(content: &str) -> Result<FleetConfig> {
    trace!("Parsing config content");
    let config: FleetConfig =
        toml::from_str(content).map_err(|e| PfError::ConfigParse(format!("TOML: {e}")))?;

    config.validate()?;

    info!(
        devices = config.devices.len(),
        managed = config.managed().count(),
        cycle_period_ms = config.cycle_period_ms,
        "Configuration loaded and validated"
    );
    Ok(config)
}

/// Render a config as TOML.
pub fn to_toml_string(config: &FleetConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| PfError::ConfigParse(format!("TOML: {e}")))
}

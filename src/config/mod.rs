//! Configuration module.
//!
//! The controller is configured from one TOML file listing the camera slots
//! and the mode and parameter defaults. Every field has a built-in default,
//! so an empty or absent file describes the stock three-camera robot.

mod loader;
mod path;
mod schema;

pub use loader::{load_config, load_config_from_str, load_effective, to_toml_string, LoadedConfig};
pub use path::{default_config_path, default_store_path, home_dir, resolve_path, APP_DIR};
pub use schema::{DeviceConfig, FleetConfig};

//! Common test utilities for the fleet controller.
//!
//! - `init_test_logging`: route tracing output through the test harness
//! - fleet helpers: a two-camera config driven over a [`MockBus`]
//! - file helpers: temp config and settings files for CLI runs
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pf::config::{DeviceConfig, FleetConfig};
use pf::controller::Controller;
use pf::device::mock::MockBus;
use pf::device::DeviceId;
use pf::store::MemoryStore;
use tracing_subscriber::EnvFilter;

pub const FRONT: DeviceId = DeviceId::new(0xC6E0_B552);
pub const REAR: DeviceId = DeviceId::new(0x053C_3165);
pub const SPARE: DeviceId = DeviceId::new(0xD892_D58D);

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two managed cameras and one unmanaged spare.
#[must_use]
pub fn two_camera_config() -> FleetConfig {
    FleetConfig {
        devices: vec![
            DeviceConfig::new("front", FRONT, true),
            DeviceConfig::new("rear", REAR, true),
            DeviceConfig::new("spare", SPARE, false),
        ],
        ..FleetConfig::default()
    }
}

/// Bus with every camera of `config` attached and powered on.
#[must_use]
pub fn bus_for(config: &FleetConfig) -> Arc<MockBus> {
    let ids: Vec<DeviceId> = config.devices.iter().map(|d| d.id).collect();
    Arc::new(MockBus::with_cameras(&ids))
}

/// Controller over `bus` with an in-memory settings store.
pub fn controller_on(bus: &Arc<MockBus>, config: &FleetConfig) -> Controller {
    init_test_logging();
    Controller::init(config, bus.clone(), Box::new(MemoryStore::new()))
        .expect("controller should initialize")
}

/// Write a config file into `dir` that keeps its settings file alongside.
pub fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).expect("write config");
    path
}

/// Config body for the two-camera fleet with the store in `settings.json`.
pub const TWO_CAMERA_TOML: &str = r#"
cycle_period_ms = 5
store_path = "settings.json"

[[devices]]
slot = "front"
id = "0xC6E0B552"

[[devices]]
slot = "rear"
id = "0x053C3165"
"#;

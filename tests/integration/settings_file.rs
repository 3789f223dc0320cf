//! Parameter round trips through the JSON settings file.

use std::time::Duration;

use pf::controller::Controller;
use pf::device::ExposureSetting;
use pf::store::{JsonFileStore, SettingsStore, StoreValue};
use pf::sync::setting_key;

use crate::common::{bus_for, init_test_logging, two_camera_config, FRONT};

#[test]
fn test_read_parameters_persist_to_file() {
    init_test_logging();
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("state").join("settings.json");
    let config = two_camera_config();
    let bus = bus_for(&config);

    let store = JsonFileStore::open(&path).unwrap();
    let mut controller = Controller::init(&config, bus.clone(), Box::new(store)).unwrap();
    controller.tick(false, Duration::ZERO);
    let report = controller.read_parameters();
    assert!(report.is_clean());
    assert!(report.store_error.is_none());
    assert!(path.exists());

    let reopened = JsonFileStore::open(&path).unwrap();
    assert!(reopened.updated_at().is_some());
    assert_eq!(
        reopened.get(&setting_key("front", "AutoExposure")),
        Some(StoreValue::Bool(true))
    );
    assert_eq!(
        reopened.get(&setting_key("rear", "ExposureGain")),
        Some(StoreValue::Number(20.0))
    );
}

#[test]
fn test_edited_file_is_applied_on_next_run() {
    init_test_logging();
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{
  "updated_at": "2026-01-01T00:00:00Z",
  "values": {
    "front/AutoExposure": false,
    "front/ExposureGain": 40,
    "front/ExposureCompensation": 250
  }
}"#,
    )
    .unwrap();
    let config = two_camera_config();
    let bus = bus_for(&config);

    let store = JsonFileStore::open(&path).unwrap();
    assert!(!store.get_bool_or(&setting_key("front", "AutoExposure"), true));
    let mut controller = Controller::init(&config, bus.clone(), Box::new(store)).unwrap();
    controller.tick(false, Duration::ZERO);
    let report = controller.write_parameters();

    assert!(report.is_clean());
    assert_eq!(
        bus.camera(FRONT).unwrap().exposure(),
        ExposureSetting::new(40, 250)
    );
}

#[test]
fn test_corrupt_file_is_a_store_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("settings.json");
    std::fs::write(&path, "not json").unwrap();

    let err = JsonFileStore::open(&path).unwrap_err();

    assert!(matches!(err, pf::error::PfError::Store(_)));
}

//! Parameter reads and writes through the controller.

use std::time::Duration;

use pf::device::mock::{CameraState, OpKind, Operation};
use pf::device::{ExposureSetting, WhiteBalanceSetting};
use pf::error::TransportFault;
use pf::sync::setting_key;

use crate::common::{bus_for, controller_on, two_camera_config, FRONT, REAR};

#[test]
fn test_read_pauses_transfers_and_resumes() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    controller.tick(true, Duration::ZERO);
    bus.clear_operations();

    let report = controller.read_parameters();

    assert!(report.is_clean());
    assert_eq!(report.parameters.len(), 2);
    bus.assert_operations_for(
        FRONT,
        &[
            Operation::StopFrameGrabber { id: FRONT },
            Operation::StopProgram { id: FRONT },
            Operation::GetAutoExposure { id: FRONT },
            Operation::GetAutoWhiteBalance { id: FRONT },
            Operation::GetExposure { id: FRONT },
            Operation::GetWhiteBalance { id: FRONT },
            Operation::StartProgram { id: FRONT },
            Operation::StartFrameGrabber { id: FRONT },
        ],
    );

    let store = controller.store();
    let activation = pf::mode::ActivationProfile::default();
    assert!(!store.get_bool_or(&setting_key("front", "AutoExposure"), true));
    assert!(!store.get_bool_or(&setting_key("rear", "AutoWhiteBalance"), true));
    assert_eq!(
        store.get_number_or(&setting_key("front", "ExposureCompensation"), -1.0),
        f64::from(activation.exposure.compensation)
    );
    assert_eq!(
        store.get_number_or(&setting_key("rear", "WhiteBalanceRed"), -1.0),
        f64::from(activation.white_balance.red)
    );
}

#[test]
fn test_read_failure_leaves_store_untouched_for_that_camera() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    controller.tick(true, Duration::ZERO);
    bus.fail_operation(REAR, OpKind::GetWhiteBalance, TransportFault::Chirp);

    let report = controller.read_parameters();

    assert!(!report.is_clean());
    assert_eq!(report.transfer.failed_devices(), vec![REAR]);
    assert_eq!(report.parameters.len(), 1);
    let store = controller.store();
    assert_eq!(
        store.get_number_or(&setting_key("rear", "ExposureGain"), -1.0),
        -1.0
    );
    assert!(store.get_bool_or(&setting_key("rear", "AutoExposure"), true));
    assert_ne!(
        store.get_number_or(&setting_key("front", "ExposureGain"), -1.0),
        -1.0
    );

    // Every camera is resumed whatever happened in between.
    let rear = bus.camera(REAR).unwrap();
    assert!(rear.program && rear.frame_grabber);
    assert!(report.resume.is_clean());
}

#[test]
fn test_camera_that_failed_to_pause_is_skipped() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    controller.tick(true, Duration::ZERO);
    bus.fail_operation(REAR, OpKind::StopFrameGrabber, TransportFault::UsbNoDevice);
    bus.clear_operations();

    let report = controller.read_parameters();

    assert_eq!(report.pause.failed_devices(), vec![REAR]);
    assert_eq!(bus.count_of(REAR, OpKind::StopProgram), 0);
    assert_eq!(bus.count_of(REAR, OpKind::GetAutoExposure), 0);
    assert_eq!(bus.count_of(FRONT, OpKind::GetAutoExposure), 1);
    assert!(bus.camera(REAR).unwrap().program);
}

#[test]
fn test_write_applies_manual_values_with_auto_off() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    controller.tick(false, Duration::ZERO);

    let store = controller.store_mut();
    store.put_bool(&setting_key("front", "AutoExposure"), false).unwrap();
    store.put_number(&setting_key("front", "ExposureGain"), 33.7).unwrap();
    store.put_number(&setting_key("front", "ExposureCompensation"), 410.0).unwrap();
    store.put_bool(&setting_key("front", "AutoWhiteBalance"), false).unwrap();
    store.put_number(&setting_key("front", "WhiteBalanceRed"), 300.0).unwrap();
    store.put_number(&setting_key("front", "WhiteBalanceGreen"), 90.9).unwrap();
    store.put_number(&setting_key("front", "WhiteBalanceBlue"), -5.0).unwrap();
    bus.clear_operations();

    let report = controller.write_parameters();

    assert!(report.is_clean());
    let camera = bus.camera(FRONT).unwrap();
    assert!(!camera.auto_exposure && !camera.auto_white_balance);
    assert_eq!(camera.exposure(), ExposureSetting::new(33, 410));
    assert_eq!(camera.white_balance(), WhiteBalanceSetting::new(255, 90, 0));

    let ae = bus
        .position(|op| *op == Operation::SetAutoExposure { id: FRONT, enable: false })
        .unwrap();
    let exposure = bus
        .position(|op| op.device() == FRONT && op.kind() == OpKind::SetExposure)
        .unwrap();
    let awb = bus
        .position(|op| *op == Operation::SetAutoWhiteBalance { id: FRONT, enable: false })
        .unwrap();
    assert!(ae < exposure && exposure < awb);

    // Idle cameras were stopped before the write and stay stopped.
    assert_eq!(bus.count_of(FRONT, OpKind::StartProgram), 0);
    assert!(!camera.program);
}

#[test]
fn test_write_skips_manual_values_when_auto_stays_on() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    controller.tick(false, Duration::ZERO);

    let store = controller.store_mut();
    store.put_bool(&setting_key("rear", "AutoExposure"), true).unwrap();
    store.put_bool(&setting_key("rear", "AutoWhiteBalance"), true).unwrap();
    store.put_number(&setting_key("rear", "ExposureGain"), 99.0).unwrap();
    bus.clear_operations();

    let report = controller.write_parameters();

    assert!(report.is_clean());
    assert_eq!(bus.count_of(REAR, OpKind::SetExposure), 0);
    assert_eq!(bus.count_of(REAR, OpKind::SetWhiteBalance), 0);
    let rear = bus.camera(REAR).unwrap();
    assert!(rear.auto_exposure && rear.auto_white_balance);
    assert_eq!(rear.exposure(), CameraState::powered_on().exposure());
}

#[test]
fn test_write_uses_defaults_for_missing_keys() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    controller.tick(false, Duration::ZERO);

    let report = controller.write_parameters();

    assert!(report.is_clean());
    let defaults = config.parameter_defaults;
    for id in [FRONT, REAR] {
        let camera = bus.camera(id).unwrap();
        assert_eq!(camera.auto_exposure, defaults.auto_exposure);
        assert_eq!(camera.exposure(), defaults.exposure);
        assert_eq!(camera.white_balance(), defaults.white_balance);
    }
}

//! Mode dispatcher behaviour across a whole fleet.

use std::time::Duration;

use pf::color::hue_rotate;
use pf::device::mock::{OpKind, Operation};
use pf::device::{ExposureSetting, WhiteBalanceSetting};
use pf::error::TransportFault;
use pf::mode::{ModeState, Transition};

use crate::common::{bus_for, controller_on, two_camera_config, FRONT, REAR, SPARE};

#[test]
fn test_first_tick_enters_idle() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);

    let outcome = controller.tick(false, Duration::ZERO);

    assert_eq!(
        outcome.transition,
        Some(Transition {
            from: None,
            to: ModeState::Idle
        })
    );
    assert!(outcome.report.is_clean());
    for id in [FRONT, REAR] {
        bus.assert_operations_for(
            id,
            &[
                Operation::StopFrameGrabber { id },
                Operation::StopProgram { id },
                Operation::SetLedMaxCurrent { id, current: 1000 },
                Operation::SetLedRgb {
                    id,
                    color: hue_rotate(0.0),
                },
            ],
        );
    }
    // Unmanaged cameras are never driven.
    assert!(bus.operations_for(SPARE).is_empty());
}

#[test]
fn test_idle_rotates_led_every_tick() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);

    controller.tick(false, Duration::ZERO);
    let outcome = controller.tick(false, Duration::from_secs(2));

    assert!(outcome.transition.is_none());
    assert_eq!(bus.count_of(FRONT, OpKind::SetLedRgb), 2);
    assert_eq!(bus.count_of(FRONT, OpKind::StopProgram), 1);
    assert_eq!(bus.camera(FRONT).unwrap().led, hue_rotate(2.0));
}

#[test]
fn test_activation_configures_every_camera_before_starting_any() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);

    controller.tick(false, Duration::ZERO);
    bus.clear_operations();
    let outcome = controller.tick(true, Duration::from_millis(20));

    assert_eq!(
        outcome.transition,
        Some(Transition {
            from: Some(ModeState::Idle),
            to: ModeState::Active
        })
    );
    assert!(outcome.report.is_clean());
    assert_eq!(outcome.report.succeeded, vec![FRONT, REAR]);

    let last_exposure = bus
        .operations()
        .iter()
        .rposition(|op| op.kind() == OpKind::SetExposure)
        .unwrap();
    let first_start = bus
        .position(|op| op.kind() == OpKind::StartProgram)
        .unwrap();
    assert!(last_exposure < first_start);

    let activation = controller_activation();
    for id in [FRONT, REAR] {
        let camera = bus.camera(id).unwrap();
        assert!(camera.program && camera.frame_grabber);
        assert!(!camera.auto_exposure && !camera.auto_white_balance);
        assert_eq!(camera.exposure(), activation.0);
        assert_eq!(camera.white_balance(), activation.1);
    }
}

fn controller_activation() -> (ExposureSetting, WhiteBalanceSetting) {
    let profile = pf::mode::ActivationProfile::default();
    (profile.exposure, profile.white_balance)
}

#[test]
fn test_auto_modes_disabled_before_manual_values() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);

    controller.tick(true, Duration::ZERO);

    let awb_off = bus
        .position(|op| *op == Operation::SetAutoWhiteBalance { id: FRONT, enable: false })
        .unwrap();
    let wb = bus
        .position(|op| op.device() == FRONT && op.kind() == OpKind::SetWhiteBalance)
        .unwrap();
    let ae_off = bus
        .position(|op| *op == Operation::SetAutoExposure { id: FRONT, enable: false })
        .unwrap();
    let exposure = bus
        .position(|op| op.device() == FRONT && op.kind() == OpKind::SetExposure)
        .unwrap();
    let grabber = bus
        .position(|op| *op == Operation::StartFrameGrabber { id: FRONT })
        .unwrap();

    assert!(awb_off < wb);
    assert!(ae_off < exposure);
    assert!(wb < grabber && exposure < grabber);
}

#[test]
fn test_failing_member_is_not_started_and_not_retried() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    bus.fail_operation(REAR, OpKind::SetWhiteBalance, TransportFault::InvalidParameter);

    let outcome = controller.tick(true, Duration::ZERO);

    assert_eq!(outcome.mode, ModeState::Active);
    assert_eq!(outcome.report.failed_devices(), vec![REAR]);
    assert!(bus.camera(FRONT).unwrap().frame_grabber);
    assert_eq!(bus.count_of(REAR, OpKind::StartProgram), 0);
    assert_eq!(bus.count_of(REAR, OpKind::SetAutoExposure), 0);

    let stops_before = bus.count_of(REAR, OpKind::StopProgram);
    let outcome = controller.tick(true, Duration::from_millis(20));
    assert!(outcome.transition.is_none());
    assert!(outcome.report.is_clean());
    assert_eq!(bus.count_of(REAR, OpKind::StopProgram), stops_before);
    assert_eq!(controller.mode(), Some(ModeState::Active));
}

#[test]
fn test_deactivation_stops_grabber_before_program() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);

    controller.tick(true, Duration::ZERO);
    bus.clear_operations();
    controller.tick(false, Duration::from_secs(1));

    bus.assert_operations_for(
        FRONT,
        &[
            Operation::StopFrameGrabber { id: FRONT },
            Operation::StopProgram { id: FRONT },
            Operation::SetLedMaxCurrent {
                id: FRONT,
                current: 1000,
            },
            Operation::SetLedRgb {
                id: FRONT,
                color: hue_rotate(1.0),
            },
        ],
    );
    let camera = bus.camera(FRONT).unwrap();
    assert!(!camera.program && !camera.frame_grabber);
}

#[test]
fn test_idle_brightness_set_even_when_stop_fails() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    bus.fail_operation(FRONT, OpKind::StopFrameGrabber, TransportFault::UsbNoDevice);

    let outcome = controller.tick(false, Duration::ZERO);

    assert_eq!(outcome.report.failed_devices(), vec![FRONT]);
    assert_eq!(bus.count_of(FRONT, OpKind::StopProgram), 0);
    assert_eq!(bus.count_of(FRONT, OpKind::SetLedMaxCurrent), 1);
    assert!(outcome.report.succeeded.contains(&REAR));
}

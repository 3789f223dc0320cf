//! Identity checks at startup and bus re-enumeration.

use std::sync::Arc;
use std::time::Duration;

use pf::commands::{CommandOutcome, CommandRegistry, ENUMERATE};
use pf::controller::Controller;
use pf::device::mock::{MockBus, OpKind};
use pf::error::{PfError, TransportFault};
use pf::store::MemoryStore;

use crate::common::{bus_for, controller_on, init_test_logging, two_camera_config, FRONT, REAR, SPARE};

#[test]
fn test_missing_managed_camera_fails_init() {
    init_test_logging();
    let config = two_camera_config();
    let bus = Arc::new(MockBus::with_cameras(&[FRONT, SPARE]));

    let err = Controller::init(&config, bus, Box::new(MemoryStore::new())).unwrap_err();

    match err {
        PfError::MissingDevices { missing } => assert_eq!(missing, vec![REAR]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_unmanaged_camera_is_tolerated() {
    init_test_logging();
    let config = two_camera_config();
    let bus = Arc::new(MockBus::with_cameras(&[FRONT, REAR]));

    let controller = Controller::init(&config, bus, Box::new(MemoryStore::new())).unwrap();

    assert_eq!(controller.fleet().member_ids(), &[FRONT, REAR]);
    assert_eq!(controller.registry().slot_of(SPARE), Some("spare"));
}

#[test]
fn test_enumerate_lists_firmware_and_reapplies_mode() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    controller.tick(true, Duration::ZERO);
    bus.clear_operations();

    let outcome = CommandRegistry::standard()
        .execute(ENUMERATE, &mut controller)
        .unwrap();

    let CommandOutcome::Enumerated(report) = outcome else {
        panic!("expected an enumeration outcome");
    };
    assert_eq!(report.devices.len(), 3);
    assert_eq!(report.devices[0].id, FRONT);
    assert_eq!(report.devices[0].slot.as_deref(), Some("front"));
    assert_eq!(report.devices[0].firmware.as_deref(), Some("2.0.19"));
    assert!(report.reentry.is_clean());

    // Cached state was dropped, so the stops are issued again.
    assert_eq!(bus.count_of(FRONT, OpKind::StopFrameGrabber), 1);
    assert_eq!(bus.count_of(FRONT, OpKind::StartFrameGrabber), 1);
    assert_eq!(bus.count_of(SPARE, OpKind::FirmwareVersion), 1);
    assert_eq!(bus.count_of(SPARE, OpKind::StopProgram), 0);
}

#[test]
fn test_enumerate_reports_unknown_camera_without_slot() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    let stranger = pf::device::DeviceId::new(0x1234_5678);
    bus.attach(stranger, pf::device::mock::CameraState::powered_on());
    bus.detach(SPARE);

    let report = controller.enumerate().unwrap();

    let ids: Vec<_> = report.devices.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![FRONT, REAR, stranger]);
    assert_eq!(report.devices[2].slot, None);
    // Nothing to re-enter before the first tick.
    assert!(report.reentry.succeeded.is_empty());
}

#[test]
fn test_enumeration_failure_is_an_error() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    bus.fail_enumeration(TransportFault::UsbIo);

    let err = controller.enumerate().unwrap_err();

    assert!(matches!(err, PfError::Enumeration(TransportFault::UsbIo)));
}

#[test]
fn test_unknown_operator_command() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);

    let err = CommandRegistry::standard()
        .execute("Reboot", &mut controller)
        .unwrap_err();

    assert!(matches!(err, PfError::UnknownCommand { .. }));
    assert!(err.suggestion().is_some());
}

#[test]
fn test_replugged_camera_recovers_on_enumerate() {
    let config = two_camera_config();
    let bus = bus_for(&config);
    let mut controller = controller_on(&bus, &config);
    controller.tick(true, Duration::ZERO);
    bus.detach(REAR);

    let report = controller.enumerate().unwrap();
    assert!(report.devices.iter().all(|d| d.id != REAR));
    assert_eq!(report.reentry.failed_devices(), vec![REAR]);

    bus.reattach(REAR);
    let report = controller.enumerate().unwrap();

    assert!(report.devices.iter().any(|d| d.id == REAR));
    assert!(report.reentry.is_clean());
    assert!(bus.camera(REAR).unwrap().frame_grabber);
}

//! Engine behavior against a simulated drive.

mod support;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use festo_fhpp::{Ccon, Cpos, Drive, DriveState, FhppError, Profile};
use parking_lot::Mutex;
use support::{connected_drive, fast_tuning, SimulatedDrive, RECORD_STEP};

#[test]
fn test_end_to_end_direct_positioning() {
    let (sim, drive) = connected_drive();

    drive.unlock(Profile::Direct).unwrap();
    assert!(drive.is_ready().unwrap());
    assert!(matches!(
        drive.read_position(),
        Err(FhppError::UnknownPosition { .. })
    ));

    drive.home().unwrap();
    assert_eq!(drive.read_position().unwrap(), 0);

    drive.position_to(15000, 255).unwrap();
    assert_eq!(drive.read_position().unwrap(), 15000);
    assert_eq!(sim.position(), 15000);

    let last = sim.last_control().unwrap();
    assert_eq!(last.ccon, Ccon::ENABLED | Ccon::DIRECT_MODE);
    assert_eq!(last.cpos, Cpos::HALT_RELEASED);
    assert_eq!(last.speed, 255);
    assert_eq!(last.setpoint, 15000);
}

#[test]
fn test_unlock_direct_is_idempotent() {
    let (sim, drive) = connected_drive();
    drive.unlock(Profile::Direct).unwrap();
    let frames = sim.control_frames().len();

    drive.unlock(Profile::Direct).unwrap();
    assert_eq!(sim.control_frames().len(), frames);
}

#[test]
fn test_unlock_direct_clears_fault_first() {
    let (sim, drive) = connected_drive();
    sim.set_fault(false);
    assert!(drive.is_error().unwrap());

    drive.unlock(Profile::Direct).unwrap();
    assert!(!drive.is_error().unwrap());
    assert!(drive.is_ready().unwrap());

    let reset = sim
        .control_frames()
        .iter()
        .any(|words| words[0] & u16::from(Ccon::FAULT_RESET.bits()) != 0);
    assert!(reset);
}

#[test]
fn test_unlock_reports_persistent_fault() {
    let (sim, drive) = connected_drive();
    sim.set_fault(true);
    assert!(matches!(
        drive.unlock(Profile::Direct),
        Err(FhppError::FaultOrWarning { .. })
    ));
}

#[test]
fn test_unlock_externally_locked() {
    let (sim, drive) = connected_drive();
    sim.set_externally_locked(true);
    match drive.unlock(Profile::Direct) {
        Err(FhppError::Locked { status }) => assert_eq!(status.state(), DriveState::Locked),
        other => panic!("Expected Locked, got {:?}", other),
    }
    assert!(drive.is_locked().unwrap());
}

#[test]
fn test_fault_fails_every_operation_at_first_observation() {
    type Operation = fn(&Drive<SimulatedDrive>) -> festo_fhpp::Result<()>;
    let operations: [(&str, Operation); 6] = [
        ("lock_drive", |d| d.lock_drive()),
        ("unlock record", |d| d.unlock(Profile::RecordSelect)),
        ("home", |d| d.home()),
        ("position_to", |d| d.position_to(100, 50)),
        ("start_record", |d| d.start_record(1)),
        ("read_position", |d| d.read_position().map(|_| ())),
    ];

    for (name, operation) in operations {
        let (sim, drive) = connected_drive();
        sim.set_fault(true);
        match operation(&drive) {
            Err(FhppError::FaultOrWarning { status }) => {
                assert!(status.has_fault_or_warning(), "{}", name)
            }
            other => panic!("{}: expected FaultOrWarning, got {:?}", name, other),
        }
        assert_eq!(sim.reads(), 1, "{}", name);
        assert!(sim.control_frames().is_empty(), "{}", name);
    }
}

#[test]
fn test_warning_fails_motion() {
    let (sim, drive) = connected_drive();
    drive.unlock(Profile::Direct).unwrap();
    sim.set_warning();
    assert!(matches!(
        drive.position_to(10, 10),
        Err(FhppError::FaultOrWarning { .. })
    ));
}

#[test]
fn test_clear_error_ignores_faults_while_polling() {
    let (sim, drive) = connected_drive();
    sim.set_fault(true);
    match drive.clear_error() {
        Err(FhppError::LongOperation {
            operation,
            attempts,
            ..
        }) => {
            assert_eq!(operation, "fault clear");
            assert_eq!(attempts, drive.tuning().retries);
        }
        other => panic!("Expected LongOperation, got {:?}", other),
    }
}

#[test]
fn test_clear_error_recovers() {
    let (sim, drive) = connected_drive();
    sim.set_fault(false);
    drive.clear_error().unwrap();
    assert!(!drive.is_error().unwrap());
}

#[test]
fn test_position_to_budget_is_exact() {
    let (sim, drive) = connected_drive();
    drive.unlock(Profile::Direct).unwrap();
    sim.set_referenced(0);
    sim.set_never_complete();

    let reads_before = sim.reads();
    match drive.position_to(5000, 100) {
        Err(FhppError::LongOperation {
            operation,
            attempts,
            ..
        }) => {
            assert_eq!(operation, "positioning");
            assert_eq!(attempts, drive.tuning().motion_retries);
        }
        other => panic!("Expected LongOperation, got {:?}", other),
    }
    // One read before the halt frame, the rest within the completion phase.
    assert_eq!(sim.reads() - reads_before, 1 + drive.tuning().motion_retries - 1);
}

#[test]
fn test_force_cancel_interrupts_homing() {
    let sim = SimulatedDrive::new();
    let tuning = fast_tuning()
        .with_homing_interval(Duration::from_millis(20))
        .with_homing_retries(10_000);
    let drive = Arc::new(Drive::with_transport(sim.clone(), tuning));
    drive.connect().unwrap();
    drive.unlock(Profile::Direct).unwrap();
    sim.set_never_complete();

    let worker = {
        let drive = Arc::clone(&drive);
        thread::spawn(move || drive.home())
    };
    thread::sleep(Duration::from_millis(100));

    let cancelled_at = Instant::now();
    drive.force_cancel().unwrap();
    let result = worker.join().unwrap();
    let latency = cancelled_at.elapsed();

    assert!(matches!(result, Err(FhppError::Cancelled { .. })));
    assert!(latency < Duration::from_millis(500), "took {:?}", latency);

    let last = sim.last_control().unwrap();
    assert_eq!(last.cpos, Cpos::CLEAR_TASK);
}

#[test]
fn test_cancel_flag_is_sticky() {
    let (_sim, drive) = connected_drive();
    drive.unlock(Profile::Direct).unwrap();
    drive.force_cancel().unwrap();

    assert!(matches!(drive.home(), Err(FhppError::Cancelled { .. })));
    assert!(matches!(
        drive.position_to(1, 1),
        Err(FhppError::Cancelled { .. })
    ));
    // Recovery does not re-arm the drive on its own.
    assert!(matches!(
        drive.unlock(Profile::Direct),
        Err(FhppError::Cancelled { .. })
    ));

    drive.reset_cancel();
    drive.unlock(Profile::Direct).unwrap();
    drive.home().unwrap();
}

#[test]
fn test_observer_sees_intermediate_positions() {
    let (sim, drive) = connected_drive();
    drive.unlock(Profile::Direct).unwrap();
    sim.set_referenced(1000);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    drive.set_observer(move |position: i32| sink.lock().push(position));

    drive.position_to(3000, 50).unwrap();
    assert_eq!(*seen.lock(), vec![2000, 3000]);

    drive.clear_observer();
    drive.position_to(1000, 50).unwrap();
    assert_eq!(seen.lock().len(), 2);
}

#[test]
fn test_record_selection() {
    let (sim, drive) = connected_drive();
    drive.unlock(Profile::RecordSelect).unwrap();
    assert!(!drive.is_locked().unwrap());

    drive.start_record(3).unwrap();
    assert_eq!(sim.position(), 3 * RECORD_STEP);

    let last = sim.last_control().unwrap();
    assert_eq!(last.ccon, Ccon::ENABLED);
    assert_eq!(last.cdir.bits(), 3);
}

#[test]
fn test_lock_drive() {
    let (_sim, drive) = connected_drive();
    drive.unlock(Profile::Direct).unwrap();
    assert!(!drive.is_locked().unwrap());

    drive.lock_drive().unwrap();
    assert!(drive.is_locked().unwrap());
    assert_eq!(drive.status().unwrap().state(), DriveState::Locked);
}

#[test]
fn test_transport_errors_propagate() {
    let sim = SimulatedDrive::new();
    let drive = Drive::with_transport(sim.clone(), fast_tuning());
    assert!(matches!(drive.status(), Err(FhppError::NotConnected)));
    assert!(matches!(
        drive.unlock(Profile::Direct),
        Err(FhppError::NotConnected)
    ));
}

#[test]
fn test_drop_disconnects() {
    let (sim, drive) = connected_drive();
    assert!(sim.is_connected());
    drop(drive);
    assert!(!sim.is_connected());
}

#[test]
fn test_last_status_tracks_observations() {
    let (_sim, drive) = connected_drive();
    assert!(drive.last_status().is_none());
    drive.unlock(Profile::Direct).unwrap();
    let last = drive.last_status().unwrap();
    assert!(last.is_direct_ready());
}

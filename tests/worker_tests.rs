//! Queued facade behavior.

mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use festo_fhpp::frame::DirectRequest;
use festo_fhpp::{AsyncDrive, Cpos, Drive, FhppError, Levels, Profile};
use parking_lot::Mutex;
use support::{fast_tuning, SimulatedDrive};

fn facade() -> (SimulatedDrive, AsyncDrive<SimulatedDrive>) {
    let sim = SimulatedDrive::new();
    let drive = AsyncDrive::new(Drive::with_transport(sim.clone(), fast_tuning())).unwrap();
    (sim, drive)
}

#[test]
fn test_blocking_wait() {
    let (sim, drive) = facade();
    drive.connect().wait().unwrap();
    drive.homing().wait().unwrap();
    drive.position_to(15000, 255).wait().unwrap();
    assert_eq!(drive.read_position().wait().unwrap(), 15000);
    assert!(drive.is_ready().wait().unwrap());
    assert_eq!(sim.position(), 15000);
}

#[tokio::test]
async fn test_await_completion() {
    let (_sim, drive) = facade();
    drive.connect().await.unwrap();
    drive.unlock(Profile::Direct).await.unwrap();
    drive.home().await.unwrap();
    drive.position_to(-400, 30).await.unwrap();
    assert_eq!(drive.read_position().await.unwrap(), -400);
    assert!(!drive.is_error().await.unwrap());
}

#[test]
fn test_jobs_run_in_submission_order() {
    let (_sim, drive) = facade();
    let order = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let order = Arc::clone(&order);
            drive.submit(move |_| {
                thread::sleep(Duration::from_millis(8 - i));
                order.lock().push(i);
                Ok(i)
            })
        })
        .collect();

    let results: Vec<u64> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
    assert_eq!(results, (0..8).collect::<Vec<_>>());
    assert_eq!(*order.lock(), (0..8).collect::<Vec<_>>());
}

#[test]
fn test_operation_errors_reach_the_handle() {
    let (_sim, drive) = facade();
    assert!(matches!(
        drive.read_position().wait(),
        Err(FhppError::NotConnected)
    ));

    drive.connect().wait().unwrap();
    assert!(matches!(
        drive.read_position().wait(),
        Err(FhppError::UnknownPosition { .. })
    ));
}

#[test]
fn test_force_cancel_bypasses_queue() {
    let (sim, drive) = facade();
    drive.connect().wait().unwrap();
    drive.unlock(Profile::Direct).wait().unwrap();
    sim.set_never_complete();

    let homing = drive.home();
    let queued = drive.status();
    thread::sleep(Duration::from_millis(50));

    drive.force_cancel().unwrap();
    assert!(matches!(homing.wait(), Err(FhppError::Cancelled { .. })));
    assert!(matches!(queued.wait(), Err(FhppError::Cancelled { .. })));

    // Jobs submitted after the cancel run normally.
    assert!(drive.status().wait().is_ok());
    assert!(!drive.drive().is_cancelled());
}

#[test]
fn test_cancel_discards_queued_homing() {
    let (sim, drive) = facade();
    drive.connect().wait().unwrap();

    let busy = drive.submit(|_| {
        thread::sleep(Duration::from_millis(100));
        Ok(())
    });
    let homing = drive.homing();
    thread::sleep(Duration::from_millis(20));
    drive.force_cancel().unwrap();

    assert!(busy.wait().is_ok());
    assert!(matches!(homing.wait(), Err(FhppError::Cancelled { .. })));

    let homed = sim.control_frames().iter().any(|words| {
        DirectRequest::from_words(words)
            .map(|request| request.cpos.contains(Cpos::HOME))
            .unwrap_or(false)
    });
    assert!(!homed);
    assert!(matches!(
        drive.read_position().wait(),
        Err(FhppError::UnknownPosition { .. })
    ));
}

#[test]
fn test_invalid_coefficient_is_rejected() {
    for coefficient in [0.0, -10.0, f64::NAN] {
        let (_sim, drive) = facade();
        assert!(matches!(
            drive.with_coefficient(coefficient),
            Err(FhppError::InvalidParameter { .. })
        ));
    }
}

#[test]
fn test_travel_to_scales_by_coefficient() {
    let (sim, drive) = facade();
    let drive = drive.with_coefficient(1000.0).unwrap();
    drive.connect().wait().unwrap();
    drive.homing().wait().unwrap();

    drive.travel_to(2.5).wait().unwrap();
    assert_eq!(sim.position(), 2500);
    assert_eq!(drive.travel_position().wait().unwrap(), 2.5);
}

#[test]
fn test_move_to_level() {
    let (sim, drive) = facade();
    let drive = drive
        .with_coefficient(10.0)
        .unwrap()
        .with_levels(Levels::new(21, 13.0).unwrap());
    drive.connect().wait().unwrap();
    drive.homing().wait().unwrap();

    drive.move_to_level(4, 100).wait().unwrap();
    assert_eq!(sim.position(), 520);

    let frames = sim.control_frames().len();
    assert!(matches!(
        drive.move_to_level(21, 100).wait(),
        Err(FhppError::InvalidParameter { .. })
    ));
    assert_eq!(sim.control_frames().len(), frames);
}

#[test]
fn test_move_to_level_without_layout() {
    let (_sim, drive) = facade();
    assert!(matches!(
        drive.move_to_level(0, 100).wait(),
        Err(FhppError::InvalidParameter { .. })
    ));
}

#[test]
fn test_drop_finishes_queued_jobs() {
    let (sim, drive) = facade();
    let done = Arc::new(AtomicBool::new(false));

    let connect = drive.connect();
    let flag = Arc::clone(&done);
    let slow = drive.submit(move |_| {
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });
    drop(drive);

    assert!(done.load(Ordering::SeqCst));
    assert!(connect.wait().is_ok());
    assert!(slow.wait().is_ok());
    // The engine disconnects once the worker released it.
    assert!(!sim.is_connected());
}

//! Example: Queued positioning with progress and cancellation
//!
//! Run with: cargo run --example positioning -- 192.168.75.70
//!
//! This example demonstrates:
//! - Running operations on the drive worker with `AsyncDrive`
//! - Waiting on results from a blocking thread
//! - Receiving positions while the drive moves
//! - Travelling in user units and to levels
//! - Cancelling a move from another thread by pressing Enter

use std::io::BufRead;
use std::sync::Arc;
use std::thread;

use festo_fhpp::{AsyncDrive, Drive, DriveConfig, FhppError, Levels, DEFAULT_MODBUS_PORT};
use tracing_subscriber::EnvFilter;

fn main() -> festo_fhpp::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("festo_fhpp=info")),
        )
        .init();

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.75.70".to_string());

    // Camera lift: 21 levels, 13 mm apart, 1000 drive units per mm
    let drive = AsyncDrive::new(Drive::new(DriveConfig::new(host, DEFAULT_MODBUS_PORT)))?
        .with_coefficient(1000.0)?
        .with_levels(Levels::new(21, 13.0)?);

    drive.set_observer(|position: i32| println!("  at {:>8}", position));

    // =========================================================================
    // Reference
    // =========================================================================

    drive.connect().wait()?;
    drive.homing().wait()?;
    println!("Homed");

    // =========================================================================
    // Move, cancellable from stdin
    // =========================================================================

    let engine = Arc::clone(drive.drive());
    thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_ok() {
            if let Err(e) = engine.force_cancel() {
                eprintln!("cancel failed: {}", e);
            }
        }
    });

    println!("Moving to level 10, press Enter to cancel");
    match drive.move_to_level(10, 100).wait() {
        Ok(()) => println!("Level 10 reached at {} mm", drive.travel_position().wait()?),
        Err(FhppError::Cancelled { .. }) => println!("Cancelled"),
        Err(e) => return Err(e),
    }

    drive.travel_to(30.0).wait()?;
    println!("At {} mm", drive.travel_position().wait()?);

    drive.lock_drive().wait()?;
    Ok(())
}

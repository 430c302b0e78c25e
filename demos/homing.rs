//! Example: Homing a Festo drive
//!
//! Run with: cargo run --example homing -- 192.168.75.70
//!
//! This example demonstrates:
//! - Installing a tracing subscriber (RUST_LOG=festo_fhpp=trace shows status tables)
//! - Checking the drive state before enabling it
//! - Clearing a pending fault, unlocking in direct mode and homing

use festo_fhpp::{Drive, DriveConfig, Profile, DEFAULT_MODBUS_PORT};
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

    // =========================================================================
    // Connect and inspect
    // =========================================================================

    let drive = Drive::new(DriveConfig::new(host, DEFAULT_MODBUS_PORT));
    drive.connect()?;

    let status = drive.status()?;
    println!("=== Drive status ===\n{:#}\n", status);

    if drive.is_error()? {
        println!("Fault present, acknowledging");
        drive.clear_error()?;
    }

    // =========================================================================
    // Unlock and home
    // =========================================================================

    drive.unlock(Profile::Direct)?;
    println!("Unlocked, ready = {}", drive.is_ready()?);

    drive.home()?;
    println!("Homed, position = {}", drive.read_position()?);

    drive.lock_drive()?;
    println!("Locked = {}", drive.is_locked()?);

    Ok(())
}

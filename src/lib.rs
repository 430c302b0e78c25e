//! # Festo FHPP Drive Library
//!
//! A Rust library for controlling Festo positioning drives through the FHPP
//! (Festo Handling and Positioning Profile) over Modbus TCP.
//!
//! The library turns the drive's bit-level handshake into a small set of
//! blocking operations: unlock, clear fault, home, position, lock. Each
//! operation sends control frames, polls the status frame and fails with a
//! typed error on faults, timeouts or cancellation.
//!
//! ## Features
//!
//! - **Typed flag bytes** - CCON/CPOS/CDIR and SCON/SPOS/SDIR as `bitflags`
//! - **Pure codec** - register frames encoded and decoded without I/O
//! - **Bounded polling** - every wait has an explicit, configurable budget
//! - **Cooperative cancellation** - [`Drive::force_cancel`] from any thread
//! - **Queued facade** - [`AsyncDrive`] runs operations on a worker thread and
//!   hands back awaitable [`Pending`] handles
//! - **Pluggable transport** - any [`RegisterTransport`], [`TcpTransport`] built in
//!
//! ## Quick Start
//!
//! ```no_run
//! use festo_fhpp::{Drive, DriveConfig, Profile, DEFAULT_MODBUS_PORT};
//!
//! fn main() -> festo_fhpp::Result<()> {
//!     let drive = Drive::new(DriveConfig::new("192.168.75.70", DEFAULT_MODBUS_PORT));
//!     drive.connect()?;
//!
//!     // Enable in direct mode, clearing a pending fault first
//!     drive.unlock(Profile::Direct)?;
//!
//!     // Reference the axis, then move at full speed
//!     drive.home()?;
//!     drive.position_to(15000, 255)?;
//!     println!("position = {}", drive.read_position()?);
//!
//!     drive.lock_drive()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Register Map
//!
//! All exchanges use 4 holding registers at address 0. Each register holds
//! two FHPP bytes, the first in the low byte:
//!
//! | Register | Control (written) | Status (read) |
//! |----------|-------------------|---------------|
//! | 0 | CCON, CPOS | SCON, SPOS |
//! | 1 | CDIR, speed (or record number) | SDIR, speed (or record status) |
//! | 2 | setpoint, high half | actual value, high half |
//! | 3 | setpoint, low half | actual value, low half |
//!
//! See the [`frame`] module for the codec.
//!
//! ## Queued Operation
//!
//! ```no_run
//! use festo_fhpp::{AsyncDrive, Drive, DriveConfig, DEFAULT_MODBUS_PORT};
//!
//! # async fn run() -> festo_fhpp::Result<()> {
//! let config = DriveConfig::new("192.168.75.70", DEFAULT_MODBUS_PORT);
//! let drive = AsyncDrive::new(Drive::new(config))?;
//! drive.set_observer(|position: i32| println!("moving: {}", position));
//!
//! drive.connect().await?;
//! drive.homing().await?;
//! drive.position_to(8000, 100).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, FhppError>`]. The only documented panic
//! is [`Pending::wait`] called from inside an asynchronous runtime.
//!
//! ```no_run
//! use festo_fhpp::{Drive, DriveConfig, FhppError, Profile, DEFAULT_MODBUS_PORT};
//!
//! let drive = Drive::new(DriveConfig::new("192.168.75.70", DEFAULT_MODBUS_PORT));
//! drive.connect()?;
//!
//! match drive.unlock(Profile::Direct) {
//!     Ok(()) => println!("ready"),
//!     Err(FhppError::Locked { status }) => println!("held by another master: {}", status),
//!     Err(FhppError::FaultOrWarning { status }) => println!("fault: {:#}", status),
//!     Err(FhppError::LongOperation { operation, attempts, .. }) => {
//!         println!("{} still pending after {} polls", operation, attempts);
//!     }
//!     Err(e) => println!("Error: {}", e),
//! }
//! # Ok::<(), FhppError>(())
//! ```
//!
//! ## Configuration
//!
//! ```
//! use festo_fhpp::{DriveConfig, Tuning, DEFAULT_MODBUS_PORT};
//! use std::time::Duration;
//!
//! let config = DriveConfig::new("192.168.75.70", DEFAULT_MODBUS_PORT)
//!     .with_unit_id(0)                                  // Modbus unit (default: 0)
//!     .with_response_timeout(Duration::from_secs(1))    // First byte (default: 1s)
//!     .with_byte_timeout(Duration::from_millis(500))    // Further bytes (default: 0.5s)
//!     .with_tuning(
//!         Tuning::default()
//!             .with_poll_interval(Duration::from_millis(50))
//!             .with_motion_retries(400),
//!     );
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod command;
mod control;
mod drive;
mod error;
pub mod frame;
mod header;
mod profile;
mod response;
mod status;
mod transport;
pub mod utils;
mod worker;

// Public re-exports
pub use command::{
    ReadRegistersCommand, ReadWriteRegistersCommand, WriteRegistersCommand,
    FC_READ_HOLDING_REGISTERS, FC_READ_WRITE_MULTIPLE_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
    MAX_READ_REGISTERS, MAX_READ_WRITE_REGISTERS, MAX_WRITE_REGISTERS,
};
pub use control::{Ccon, Cdir, ControlMode, Cpos};
pub use drive::{
    Drive, DriveConfig, PositionObserver, Tuning, DEFAULT_HOMING_INTERVAL, DEFAULT_HOMING_RETRIES,
    DEFAULT_MOTION_RETRIES, DEFAULT_POLL_INTERVAL, DEFAULT_RETRIES,
};
pub use error::{FhppError, Result};
pub use header::{MbapHeader, MBAP_HEADER_SIZE};
pub use profile::Profile;
pub use response::ModbusResponse;
pub use status::{DriveState, DriveStatus, OperatingMode, Scon, Sdir, Spos};
pub use transport::{
    RegisterTransport, TcpTransport, DEFAULT_BYTE_TIMEOUT, DEFAULT_MODBUS_PORT,
    DEFAULT_RESPONSE_TIMEOUT,
};
pub use worker::{AsyncDrive, Levels, Pending, DEFAULT_TRAVEL_SPEED};

//! Blocking FHPP drive engine.
//!
//! This module provides [`Drive`], the state machine that enables, homes and
//! positions a Festo drive through a [`RegisterTransport`].
//!
//! # Overview
//!
//! Every operation follows the same pattern:
//! - send a control frame with write-and-read, giving the first status observation
//! - check cancellation, then fault/warning, then the target condition
//! - sleep one poll interval and read status again until the budget runs out
//!
//! A budget of N means exactly N status observations. Running out yields
//! [`FhppError::LongOperation`].
//!
//! # Example
//!
//! ```no_run
//! use festo_fhpp::{Drive, DriveConfig, Profile};
//!
//! let drive = Drive::new(DriveConfig::new("192.168.0.10", 502));
//! drive.connect()?;
//! drive.unlock(Profile::Direct)?;
//! drive.home()?;
//! drive.position_to(15000, 255)?;
//! assert_eq!(drive.read_position()?, 15000);
//! # Ok::<(), festo_fhpp::FhppError>(())
//! ```
//!
//! # Thread Safety
//!
//! All methods take `&self`. Share the engine through an `Arc` to call
//! [`Drive::force_cancel`] from one thread while another is polling.
//!
//! The cancellation flag is sticky. After a cancel every operation, recovery
//! included, fails with [`FhppError::Cancelled`] until
//! [`Drive::reset_cancel`] is called.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::control::{Ccon, Cpos};
use crate::error::{FhppError, Result};
use crate::frame::{
    decode_direct, decode_record_select, encode_record_select, DirectRequest, DirectStatus,
    RecordSelectStatus, FRAME_ADDRESS, FRAME_WORDS,
};
use crate::profile::Profile;
use crate::status::{DriveState, DriveStatus, Scon, Spos};
use crate::transport::{
    RegisterTransport, TcpTransport, DEFAULT_BYTE_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT,
};

/// Default delay between status reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Default budget for enable, acknowledge, fault clear and lock phases.
pub const DEFAULT_RETRIES: u32 = 10;
/// Default budget for the motion completion phase.
pub const DEFAULT_MOTION_RETRIES: u32 = 400;
/// Default budget for the homing completion phase.
pub const DEFAULT_HOMING_RETRIES: u32 = 600;
/// Default delay between status reads while homing.
pub const DEFAULT_HOMING_INTERVAL: Duration = Duration::from_millis(100);

/// Poll timing and budgets.
///
/// # Example
///
/// ```
/// use festo_fhpp::Tuning;
/// use std::time::Duration;
///
/// let tuning = Tuning::default()
///     .with_poll_interval(Duration::from_millis(20))
///     .with_motion_retries(1000);
/// assert_eq!(tuning.retries, 10);
/// assert_eq!(tuning.motion_retries, 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tuning {
    /// Delay between status reads.
    pub poll_interval: Duration,
    /// Observations allowed for short phases.
    pub retries: u32,
    /// Observations allowed until motion completes.
    pub motion_retries: u32,
    /// Observations allowed until homing completes.
    pub homing_retries: u32,
    /// Delay between status reads while homing.
    pub homing_interval: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retries: DEFAULT_RETRIES,
            motion_retries: DEFAULT_MOTION_RETRIES,
            homing_retries: DEFAULT_HOMING_RETRIES,
            homing_interval: DEFAULT_HOMING_INTERVAL,
        }
    }
}

impl Tuning {
    /// Sets the delay between status reads.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the budget for short phases.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the budget for motion completion.
    pub fn with_motion_retries(mut self, retries: u32) -> Self {
        self.motion_retries = retries;
        self
    }

    /// Sets the budget for homing completion.
    pub fn with_homing_retries(mut self, retries: u32) -> Self {
        self.homing_retries = retries;
        self
    }

    /// Sets the delay between status reads while homing.
    pub fn with_homing_interval(mut self, interval: Duration) -> Self {
        self.homing_interval = interval;
        self
    }
}

/// Configuration for creating a [`Drive`] over Modbus TCP.
///
/// # Example
///
/// ```
/// use festo_fhpp::{DriveConfig, Tuning};
/// use std::time::Duration;
///
/// let config = DriveConfig::new("192.168.0.10", 502)
///     .with_unit_id(1)
///     .with_response_timeout(Duration::from_secs(2))
///     .with_tuning(Tuning::default().with_retries(20));
/// assert_eq!(config.tuning.retries, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveConfig {
    /// Drive host name or IP address.
    pub host: String,
    /// Modbus TCP port.
    pub port: u16,
    /// Modbus unit identifier.
    pub unit_id: u8,
    /// Time to wait for the first byte of a response.
    pub response_timeout: Duration,
    /// Time to wait for each further chunk of a response.
    pub byte_timeout: Duration,
    /// Poll timing and budgets.
    pub tuning: Tuning,
}

impl DriveConfig {
    /// Creates a configuration with default timeouts and tuning.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id: 0,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            byte_timeout: DEFAULT_BYTE_TIMEOUT,
            tuning: Tuning::default(),
        }
    }

    /// Sets the Modbus unit identifier (default 0).
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Sets the response timeout (default 1 second).
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the byte timeout (default 500 ms).
    pub fn with_byte_timeout(mut self, timeout: Duration) -> Self {
        self.byte_timeout = timeout;
        self
    }

    /// Sets poll timing and budgets.
    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    fn transport(&self) -> TcpTransport {
        TcpTransport::new(self.host.clone(), self.port)
            .with_unit_id(self.unit_id)
            .with_response_timeout(self.response_timeout)
            .with_byte_timeout(self.byte_timeout)
    }
}

/// Receives the current position while a positioning task runs.
///
/// Called from the thread running the operation, so implementations must not
/// block. Closures taking an `i32` implement it directly.
pub trait PositionObserver: Send + Sync {
    /// Reports the actual position decoded from the latest status frame.
    fn current_position(&self, position: i32);
}

impl<F> PositionObserver for F
where
    F: Fn(i32) + Send + Sync,
{
    fn current_position(&self, position: i32) {
        self(position)
    }
}

/// A status frame the engine can poll on.
trait StatusFrame: Copy {
    fn decode(words: &[u16]) -> Result<Self>;
    fn drive_status(&self) -> DriveStatus;
}

impl StatusFrame for DirectStatus {
    fn decode(words: &[u16]) -> Result<Self> {
        decode_direct(words)
    }

    fn drive_status(&self) -> DriveStatus {
        DirectStatus::drive_status(self)
    }
}

impl StatusFrame for RecordSelectStatus {
    fn decode(words: &[u16]) -> Result<Self> {
        decode_record_select(words)
    }

    fn drive_status(&self) -> DriveStatus {
        RecordSelectStatus::drive_status(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Faults {
    Fail,
    Ignore,
}

/// One polling phase of an operation.
#[derive(Debug, Clone, Copy)]
struct Phase {
    name: &'static str,
    budget: u32,
    interval: Duration,
    faults: Faults,
}

const DIRECT_ENABLED: Ccon = Ccon::ENABLED.union(Ccon::DIRECT_MODE);

/// FHPP drive engine.
///
/// Each operation blocks until the drive reaches the target state, a
/// terminal condition is observed or the budget runs out. The engine keeps
/// no drive state of its own apart from the last observed status and the
/// cancellation flag.
pub struct Drive<T: RegisterTransport = TcpTransport> {
    transport: T,
    tuning: Tuning,
    cancelled: AtomicBool,
    cancel_epoch: AtomicU64,
    observer: Mutex<Option<Arc<dyn PositionObserver>>>,
    last_status: Mutex<Option<DriveStatus>>,
}

impl Drive<TcpTransport> {
    /// Creates an engine talking Modbus TCP. Call [`connect`](Drive::connect)
    /// before running operations.
    pub fn new(config: DriveConfig) -> Self {
        Self::with_transport(config.transport(), config.tuning)
    }
}

impl<T: RegisterTransport> Drive<T> {
    /// Creates an engine over any register transport.
    pub fn with_transport(transport: T, tuning: Tuning) -> Self {
        Self {
            transport,
            tuning,
            cancelled: AtomicBool::new(false),
            cancel_epoch: AtomicU64::new(0),
            observer: Mutex::new(None),
            last_status: Mutex::new(None),
        }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the poll timing and budgets.
    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    /// Opens the transport connection.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the connection cannot be opened.
    pub fn connect(&self) -> Result<()> {
        self.transport.connect()?;
        info!("drive connected");
        Ok(())
    }

    /// Closes the transport connection. Idempotent.
    pub fn disconnect(&self) {
        self.transport.disconnect();
        debug!("drive disconnected");
    }

    /// Installs the observer notified during positioning.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use festo_fhpp::{Drive, DriveConfig};
    ///
    /// let drive = Drive::new(DriveConfig::new("192.168.0.10", 502));
    /// drive.set_observer(|position: i32| println!("at {}", position));
    /// ```
    pub fn set_observer(&self, observer: impl PositionObserver + 'static) {
        *self.observer.lock() = Some(Arc::new(observer));
    }

    /// Removes the positioning observer.
    pub fn clear_observer(&self) {
        *self.observer.lock() = None;
    }

    /// Returns the most recently observed status, if any.
    pub fn last_status(&self) -> Option<DriveStatus> {
        *self.last_status.lock()
    }

    /// Returns whether the cancellation flag is set.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clears the cancellation flag.
    ///
    /// Every operation fails with `Cancelled` while the flag is set, so this
    /// is the only way back after [`force_cancel`](Drive::force_cancel).
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Returns the number of [`force_cancel`](Drive::force_cancel) calls so far.
    ///
    /// Compare two readings to tell whether a cancel happened in between.
    pub fn cancel_epoch(&self) -> u64 {
        self.cancel_epoch.load(Ordering::SeqCst)
    }

    /// Disables the drive.
    ///
    /// Writes a neutral control frame and waits until the drive reports
    /// DRIVE_ENABLED clear.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled`, `FaultOrWarning`, `LongOperation` or a transport
    /// error.
    pub fn lock_drive(&self) -> Result<()> {
        info!("locking drive");
        let status: DirectStatus = self.read()?;
        self.check(&status.drive_status(), Faults::Fail)?;

        let first: DirectStatus = self.send(DirectRequest::default().to_words())?;
        self.poll(self.short("lock"), first, |_| {}, |s| {
            !s.scon.contains(Scon::DRIVE_ENABLED)
        })?;
        info!("drive locked");
        Ok(())
    }

    /// Enables the drive in the given profile.
    ///
    /// In the direct profile an active
    /// fault is cleared before enabling, and a drive that is already enabled
    /// with halt released returns at once.
    ///
    /// # Errors
    ///
    /// - `FhppError::Locked` if another master holds control
    /// - `FhppError::FaultOrWarning` if a fault is present and cannot be cleared
    /// - `FhppError::LongOperation` if an enable phase runs out of budget
    /// - `FhppError::Cancelled` if [`force_cancel`](Drive::force_cancel) is called meanwhile
    pub fn unlock(&self, profile: Profile) -> Result<()> {
        info!(%profile, "unlocking drive");
        match profile {
            Profile::RecordSelect => self.unlock_record_select()?,
            Profile::Direct => self.unlock_direct()?,
        }
        info!(%profile, "drive unlocked");
        Ok(())
    }

    fn unlock_record_select(&self) -> Result<()> {
        let status: RecordSelectStatus = self.read()?;
        let drive = status.drive_status();
        self.check(&drive, Faults::Fail)?;
        check_external_lock(&drive)?;

        let _: RecordSelectStatus =
            self.send(encode_record_select(Ccon::empty(), Cpos::empty(), 0))?;
        let first: RecordSelectStatus =
            self.send(encode_record_select(Ccon::ENABLED, Cpos::empty(), 0))?;
        self.poll(self.short("enable"), first, |_| {}, |s| s.is_enabled())?;
        Ok(())
    }

    fn unlock_direct(&self) -> Result<()> {
        let status: DirectStatus = self.read()?;
        let mut drive = status.drive_status();
        self.check(&drive, Faults::Ignore)?;
        check_external_lock(&drive)?;

        if drive.has_fault_or_warning() {
            info!(status = %drive, "clearing fault before unlock");
            drive = match self.clear_fault(Profile::Direct) {
                Ok(status) => status,
                Err(FhppError::LongOperation { status, .. }) => {
                    return Err(FhppError::FaultOrWarning { status })
                }
                Err(e) => return Err(e),
            };
        }

        if drive.is_direct_ready() {
            debug!("drive already enabled in direct mode");
            return Ok(());
        }

        let first: DirectStatus = self.send(
            DirectRequest::new(Ccon::DRIVE_ENABLE | Ccon::DIRECT_MODE, Cpos::empty()).to_words(),
        )?;
        self.poll(self.short("drive enable"), first, |_| {}, |s| {
            s.scon.contains(Scon::DRIVE_ENABLED)
        })?;

        let first: DirectStatus =
            self.send(DirectRequest::new(DIRECT_ENABLED, Cpos::HALT_RELEASED).to_words())?;
        self.poll(self.short("operation enable"), first, |_| {}, |s| {
            s.is_direct_ready()
        })?;
        Ok(())
    }

    /// Acknowledges a fault or warning.
    ///
    /// The profile is taken from the operating mode the drive reports. Faults
    /// observed while waiting do not fail the operation.
    ///
    /// # Errors
    ///
    /// Returns `LongOperation` if the fault is still present when the budget
    /// runs out, `Cancelled`, or a transport error.
    pub fn clear_error(&self) -> Result<()> {
        let status: DirectStatus = self.read()?;
        let profile = Profile::from_operating_mode(status.scon.operating_mode());
        info!(%profile, status = %status.drive_status(), "clearing fault");
        self.clear_fault(profile)?;
        info!("fault cleared");
        Ok(())
    }

    fn clear_fault(&self, profile: Profile) -> Result<DriveStatus> {
        let phase = self.short("fault clear").ignoring_faults();
        let done = |s: &DriveStatus| !s.has_fault_or_warning() && !s.spos.contains(Spos::ACK);

        match profile {
            Profile::RecordSelect => {
                let _: RecordSelectStatus =
                    self.send(encode_record_select(Ccon::ENABLED, Cpos::empty(), 0))?;
                let first: RecordSelectStatus = self.send(encode_record_select(
                    Ccon::ENABLED | Ccon::FAULT_RESET,
                    Cpos::empty(),
                    0,
                ))?;
                Ok(self.poll(phase, first, |_| {}, done)?.drive_status())
            }
            Profile::Direct => {
                let _: DirectStatus = self.send(
                    DirectRequest::new(DIRECT_ENABLED | Ccon::FAULT_RESET, Cpos::empty())
                        .to_words(),
                )?;
                let first: DirectStatus =
                    self.send(DirectRequest::new(DIRECT_ENABLED, Cpos::empty()).to_words())?;
                Ok(self.poll(phase, first, |_| {}, done)?.drive_status())
            }
        }
    }

    /// Runs the reference search.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled`, `FaultOrWarning`, `Locked`, `LongOperation` or a
    /// transport error.
    pub fn home(&self) -> Result<()> {
        info!("homing");
        self.prepare_motion()?;

        let first: DirectStatus = self
            .send(DirectRequest::new(DIRECT_ENABLED, Cpos::HALT_RELEASED | Cpos::HOME).to_words())?;
        self.poll(self.short("homing start"), first, |_| {}, |s| {
            s.is_acknowledged()
        })?;

        let first: DirectStatus =
            self.send(DirectRequest::new(DIRECT_ENABLED, Cpos::HALT_RELEASED).to_words())?;
        let phase = Phase {
            name: "homing",
            budget: self.tuning.homing_retries,
            interval: self.tuning.homing_interval,
            faults: Faults::Fail,
        };
        let done = self.poll(phase, first, |_| {}, |s| {
            s.is_referenced() && s.is_motion_complete()
        })?;
        info!(position = done.position, "homing complete");
        Ok(())
    }

    /// Moves to an absolute position in the direct profile.
    ///
    /// `speed` is a percentage of the configured maximum. The position
    /// observer is called on every observation while the drive moves.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled`, `FaultOrWarning`, `Locked`, `LongOperation` or a
    /// transport error.
    pub fn position_to(&self, target: i32, speed: u8) -> Result<()> {
        info!(target, speed, "positioning");
        self.prepare_motion()?;

        let halted: DirectStatus = self.send(
            DirectRequest::new(DIRECT_ENABLED, Cpos::empty())
                .with_setpoint(speed, target)
                .to_words(),
        )?;
        self.check(&halted.drive_status(), Faults::Fail)?;

        let start = DirectRequest::new(DIRECT_ENABLED, Cpos::HALT_RELEASED | Cpos::START)
            .with_setpoint(speed, target);
        let first: DirectStatus = self.send(start.to_words())?;
        self.poll(self.short("positioning start"), first, |_| {}, |s| {
            s.is_acknowledged()
        })?;

        let release = DirectRequest {
            cpos: Cpos::HALT_RELEASED,
            ..start
        };
        let first: DirectStatus = self.send(release.to_words())?;
        let observer = self.observer.lock().clone();
        let phase = Phase {
            name: "positioning",
            budget: self.tuning.motion_retries,
            interval: self.tuning.poll_interval,
            faults: Faults::Fail,
        };
        let done = self.poll(
            phase,
            first,
            |s| {
                if let Some(observer) = &observer {
                    observer.current_position(s.position);
                }
            },
            |s| s.is_motion_complete(),
        )?;
        info!(position = done.position, "position reached");
        Ok(())
    }

    /// Starts a stored positioning record in the record selection profile
    /// and waits for it to complete.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled`, `FaultOrWarning`, `Locked`, `LongOperation` or a
    /// transport error.
    pub fn start_record(&self, record: u8) -> Result<()> {
        info!(record, "starting record");
        let status: RecordSelectStatus = self.read()?;
        let drive = status.drive_status();
        self.check(&drive, Faults::Fail)?;
        check_external_lock(&drive)?;

        let _: RecordSelectStatus =
            self.send(encode_record_select(Ccon::ENABLED, Cpos::HALT_RELEASED, record))?;
        let first: RecordSelectStatus = self.send(encode_record_select(
            Ccon::ENABLED,
            Cpos::HALT_RELEASED | Cpos::START,
            record,
        ))?;
        self.poll(self.short("record start"), first, |_| {}, |s| {
            s.is_acknowledged()
        })?;

        let first: RecordSelectStatus =
            self.send(encode_record_select(Ccon::ENABLED, Cpos::HALT_RELEASED, record))?;
        let phase = Phase {
            name: "record",
            budget: self.tuning.motion_retries,
            interval: self.tuning.poll_interval,
            faults: Faults::Fail,
        };
        self.poll(phase, first, |_| {}, |s| s.is_motion_complete())?;
        info!(record, "record complete");
        Ok(())
    }

    /// Reads the actual position.
    ///
    /// # Errors
    ///
    /// - `FhppError::FaultOrWarning` if a fault or warning is present
    /// - `FhppError::UnknownPosition` if the drive is not referenced
    pub fn read_position(&self) -> Result<i32> {
        let status: DirectStatus = self.read()?;
        let drive = status.drive_status();
        if drive.has_fault_or_warning() {
            return Err(FhppError::FaultOrWarning { status: drive });
        }
        if !drive.is_referenced() {
            return Err(FhppError::UnknownPosition { status: drive });
        }
        Ok(status.position)
    }

    /// Reads and decodes the status bytes.
    pub fn status(&self) -> Result<DriveStatus> {
        let status: DirectStatus = self.read()?;
        Ok(status.drive_status())
    }

    /// Returns whether the drive is disabled or held by another master.
    pub fn is_locked(&self) -> Result<bool> {
        let status = self.status()?;
        Ok(!status.is_enabled() || status.scon.contains(Scon::EXTERNALLY_LOCKED))
    }

    /// Returns whether a fault or warning is present.
    pub fn is_error(&self) -> Result<bool> {
        Ok(self.status()?.has_fault_or_warning())
    }

    /// Returns whether the drive is enabled, idle and free of faults.
    pub fn is_ready(&self) -> Result<bool> {
        let status = self.status()?;
        Ok(status.state() == DriveState::Ready
            && !status.scon.contains(Scon::EXTERNALLY_LOCKED))
    }

    /// Cancels the running operation and halts the drive.
    ///
    /// Sets the cancellation flag, then writes a halt and a clear-task frame
    /// without waiting for acknowledgement. The flag stays set when a write
    /// fails. Safe to call from any thread.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the halt sequence, after logging it.
    pub fn force_cancel(&self) -> Result<()> {
        // Epoch before flag. AsyncDrive clears the flag, then compares epochs.
        self.cancel_epoch.fetch_add(1, Ordering::SeqCst);
        self.cancelled.store(true, Ordering::SeqCst);
        warn!("cancel requested");
        let result = self.halt();
        if let Err(e) = &result {
            warn!(error = %e, "halt after cancel failed");
        }
        result
    }

    fn halt(&self) -> Result<()> {
        let status: DirectStatus = self.read()?;
        let mut ccon = Profile::from_operating_mode(status.scon.operating_mode()).mode_bits();
        if status.scon.contains(Scon::DRIVE_ENABLED) {
            ccon |= Ccon::DRIVE_ENABLE;
        }
        if status.scon.contains(Scon::OPERATION_ENABLED) {
            ccon |= Ccon::OPERATION_ENABLE;
        }
        self.transport
            .write_registers(FRAME_ADDRESS, &DirectRequest::new(ccon, Cpos::empty()).to_words())?;
        self.transport.write_registers(
            FRAME_ADDRESS,
            &DirectRequest::new(ccon, Cpos::CLEAR_TASK).to_words(),
        )?;
        debug!(%ccon, "halt and clear task written");
        Ok(())
    }

    fn prepare_motion(&self) -> Result<()> {
        let status: DirectStatus = self.read()?;
        let drive = status.drive_status();
        self.check(&drive, Faults::Fail)?;
        check_external_lock(&drive)
    }

    fn short(&self, name: &'static str) -> Phase {
        Phase {
            name,
            budget: self.tuning.retries,
            interval: self.tuning.poll_interval,
            faults: Faults::Fail,
        }
    }

    fn read<S: StatusFrame>(&self) -> Result<S> {
        let words = self
            .transport
            .read_registers(FRAME_ADDRESS, FRAME_WORDS as u16)?;
        self.observe(&words)
    }

    fn send<S: StatusFrame>(&self, words: [u16; FRAME_WORDS]) -> Result<S> {
        let words = self.transport.write_and_read_registers(
            FRAME_ADDRESS,
            &words,
            FRAME_ADDRESS,
            FRAME_WORDS as u16,
        )?;
        self.observe(&words)
    }

    fn observe<S: StatusFrame>(&self, words: &[u16]) -> Result<S> {
        let status = S::decode(words)?;
        let drive = status.drive_status();
        trace!("status\n{:#}", drive);
        *self.last_status.lock() = Some(drive);
        Ok(status)
    }

    fn check(&self, status: &DriveStatus, faults: Faults) -> Result<()> {
        if self.is_cancelled() {
            return Err(FhppError::cancelled(Some(*status)));
        }
        if faults == Faults::Fail && status.has_fault_or_warning() {
            warn!(%status, "drive reports fault or warning");
            return Err(FhppError::FaultOrWarning { status: *status });
        }
        Ok(())
    }

    fn poll<S, F, D>(&self, phase: Phase, first: S, mut on_status: F, done: D) -> Result<S>
    where
        S: StatusFrame,
        F: FnMut(&S),
        D: Fn(&DriveStatus) -> bool,
    {
        let budget = phase.budget.max(1);
        let mut status = first;
        let mut attempts = 1;
        loop {
            let drive = status.drive_status();
            self.check(&drive, phase.faults)?;
            on_status(&status);
            if done(&drive) {
                debug!(phase = phase.name, attempts, "phase complete");
                return Ok(status);
            }
            if attempts >= budget {
                warn!(phase = phase.name, attempts, status = %drive, "budget exhausted");
                return Err(FhppError::long_operation(phase.name, attempts, drive));
            }
            thread::sleep(phase.interval);
            status = self.read()?;
            attempts += 1;
        }
    }
}

impl Phase {
    fn ignoring_faults(mut self) -> Self {
        self.faults = Faults::Ignore;
        self
    }
}

fn check_external_lock(status: &DriveStatus) -> Result<()> {
    if status.scon.contains(Scon::EXTERNALLY_LOCKED) {
        warn!(%status, "drive locked by external control");
        return Err(FhppError::Locked { status: *status });
    }
    Ok(())
}

impl<T: RegisterTransport> Drop for Drive<T> {
    fn drop(&mut self) {
        self.transport.disconnect();
    }
}

impl<T: RegisterTransport + std::fmt::Debug> std::fmt::Debug for Drive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drive")
            .field("transport", &self.transport)
            .field("tuning", &self.tuning)
            .field("cancelled", &self.is_cancelled())
            .field("last_status", &self.last_status())
            .finish()
    }
}

//! Non-blocking facade over the drive engine.
//!
//! [`AsyncDrive`] owns a [`Drive`] and runs its operations one at a time on a
//! dedicated worker thread. Each call returns a [`Pending`] handle right
//! away: `.await` it from async code or call [`Pending::wait`] from a
//! blocking thread.
//!
//! # Cancellation
//!
//! [`AsyncDrive::force_cancel`] cancels the running operation and every
//! operation queued before the call. Operations queued after it run
//! normally: the worker clears the engine's cancellation flag before each job
//! whose submission is newer than the last cancel.
//!
//! # Example
//!
//! ```no_run
//! use festo_fhpp::{AsyncDrive, Drive, DriveConfig, Levels};
//!
//! # async fn run() -> festo_fhpp::Result<()> {
//! let drive = AsyncDrive::new(Drive::new(DriveConfig::new("192.168.0.10", 502)))?
//!     .with_coefficient(1000.0)?
//!     .with_levels(Levels::new(21, 13.0)?);
//!
//! drive.connect().await?;
//! drive.homing().await?;
//! drive.move_to_level(4, 100).await?;
//! println!("at {} mm", drive.travel_position().await?);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::drive::{Drive, PositionObserver};
use crate::error::{FhppError, Result};
use crate::profile::Profile;
use crate::status::DriveStatus;
use crate::transport::{RegisterTransport, TcpTransport};

/// Speed used by [`AsyncDrive::travel_to`] unless configured otherwise.
pub const DEFAULT_TRAVEL_SPEED: u8 = 100;

type Job<T> = Box<dyn FnOnce(&Drive<T>) + Send>;

/// Completion handle of a queued operation.
///
/// Resolves to [`FhppError::WorkerStopped`] if the worker goes away before
/// running the job.
#[must_use = "a queued operation reports its result through this handle"]
#[derive(Debug)]
pub struct Pending<R> {
    rx: oneshot::Receiver<Result<R>>,
}

impl<R> Pending<R> {
    /// Blocks until the operation finishes.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous runtime; `.await` the
    /// handle there instead.
    pub fn wait(self) -> Result<R> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(FhppError::WorkerStopped))
    }
}

impl<R> Future for Pending<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(FhppError::WorkerStopped)))
    }
}

/// Evenly spaced stop positions, in user units.
///
/// Level `n` lies at `n * level_height`. Valid levels are `0..max_levels`.
///
/// # Example
///
/// ```
/// use festo_fhpp::Levels;
///
/// let levels = Levels::new(21, 13.0).unwrap();
/// assert_eq!(levels.height_of(4).unwrap(), 52.0);
/// assert!(levels.height_of(21).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Levels {
    /// Number of levels.
    pub max_levels: u32,
    /// Distance between neighbouring levels.
    pub level_height: f64,
}

impl Levels {
    /// Creates a level layout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if there are no levels or the height is not
    /// a positive finite number.
    pub fn new(max_levels: u32, level_height: f64) -> Result<Self> {
        if max_levels == 0 {
            return Err(FhppError::invalid_parameter(
                "max_levels",
                "must be greater than 0",
            ));
        }
        if !level_height.is_finite() || level_height <= 0.0 {
            return Err(FhppError::invalid_parameter(
                "level_height",
                format!("must be a positive number, got {}", level_height),
            ));
        }
        Ok(Self {
            max_levels,
            level_height,
        })
    }

    /// Returns the height of a level.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `level` is not below `max_levels`.
    pub fn height_of(&self, level: u32) -> Result<f64> {
        if level >= self.max_levels {
            return Err(FhppError::invalid_parameter(
                "level",
                format!("{} is out of range 0..{}", level, self.max_levels),
            ));
        }
        Ok(f64::from(level) * self.level_height)
    }
}

/// Queued, non-blocking access to a [`Drive`].
///
/// Operations run strictly in submission order on one worker thread named
/// `fhpp-drive`. [`force_cancel`](AsyncDrive::force_cancel) skips the queue so
/// it can interrupt the running operation. Dropping the facade lets queued
/// operations finish, then joins the worker.
pub struct AsyncDrive<T: RegisterTransport + 'static = TcpTransport> {
    drive: Arc<Drive<T>>,
    jobs: Option<Sender<Job<T>>>,
    worker: Option<JoinHandle<()>>,
    coefficient: f64,
    travel_speed: u8,
    levels: Option<Levels>,
}

impl<T: RegisterTransport + 'static> AsyncDrive<T> {
    /// Starts the worker thread for `drive`.
    ///
    /// # Errors
    ///
    /// Returns `FhppError::Io` if the thread cannot be spawned.
    pub fn new(drive: Drive<T>) -> Result<Self> {
        let drive = Arc::new(drive);
        let (jobs, queue) = crossbeam_channel::unbounded();
        let worker = thread::Builder::new().name("fhpp-drive".into()).spawn({
            let drive = Arc::clone(&drive);
            move || run_jobs(drive, queue)
        })?;

        Ok(Self {
            drive,
            jobs: Some(jobs),
            worker: Some(worker),
            coefficient: 1.0,
            travel_speed: DEFAULT_TRAVEL_SPEED,
            levels: None,
        })
    }

    /// Sets the drive units per user unit used by the travel helpers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `coefficient` is not a positive finite
    /// number.
    pub fn with_coefficient(mut self, coefficient: f64) -> Result<Self> {
        self.coefficient = check_coefficient(coefficient)?;
        Ok(self)
    }

    /// Sets the speed used by [`travel_to`](AsyncDrive::travel_to).
    pub fn with_travel_speed(mut self, speed: u8) -> Self {
        self.travel_speed = speed;
        self
    }

    /// Sets the level layout used by [`move_to_level`](AsyncDrive::move_to_level).
    pub fn with_levels(mut self, levels: Levels) -> Self {
        self.levels = Some(levels);
        self
    }

    /// Returns the shared engine.
    pub fn drive(&self) -> &Arc<Drive<T>> {
        &self.drive
    }

    /// Returns the drive units per user unit.
    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    /// Returns the configured level layout.
    pub fn levels(&self) -> Option<Levels> {
        self.levels
    }

    /// Queues a job and returns its completion handle.
    ///
    /// The job fails with `Cancelled` without running if a cancel arrives
    /// between submission and its start.
    pub fn submit<R, F>(&self, job: F) -> Pending<R>
    where
        R: Send + 'static,
        F: FnOnce(&Drive<T>) -> Result<R> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let epoch = self.drive.cancel_epoch();
        let job: Job<T> = Box::new(move |drive| {
            drive.reset_cancel();
            let result = if drive.cancel_epoch() == epoch {
                job(drive)
            } else {
                debug!("skipping job cancelled while queued");
                Err(FhppError::cancelled(drive.last_status()))
            };
            // The caller may have dropped its handle.
            let _ = tx.send(result);
        });
        if let Some(jobs) = &self.jobs {
            if jobs.send(job).is_err() {
                error!("drive worker is gone");
            }
        }
        Pending { rx }
    }

    /// Queues [`Drive::connect`].
    pub fn connect(&self) -> Pending<()> {
        self.submit(|drive| drive.connect())
    }

    /// Queues [`Drive::disconnect`].
    pub fn disconnect(&self) -> Pending<()> {
        self.submit(|drive| {
            drive.disconnect();
            Ok(())
        })
    }

    /// Queues [`Drive::unlock`].
    pub fn unlock(&self, profile: Profile) -> Pending<()> {
        self.submit(move |drive| drive.unlock(profile))
    }

    /// Queues [`Drive::lock_drive`].
    pub fn lock_drive(&self) -> Pending<()> {
        self.submit(|drive| drive.lock_drive())
    }

    /// Queues [`Drive::clear_error`].
    pub fn clear_error(&self) -> Pending<()> {
        self.submit(|drive| drive.clear_error())
    }

    /// Queues [`Drive::home`].
    pub fn home(&self) -> Pending<()> {
        self.submit(|drive| drive.home())
    }

    /// Queues [`Drive::position_to`].
    pub fn position_to(&self, target: i32, speed: u8) -> Pending<()> {
        self.submit(move |drive| drive.position_to(target, speed))
    }

    /// Queues [`Drive::start_record`].
    pub fn start_record(&self, record: u8) -> Pending<()> {
        self.submit(move |drive| drive.start_record(record))
    }

    /// Queues [`Drive::read_position`].
    pub fn read_position(&self) -> Pending<i32> {
        self.submit(|drive| drive.read_position())
    }

    /// Queues [`Drive::status`].
    pub fn status(&self) -> Pending<DriveStatus> {
        self.submit(|drive| drive.status())
    }

    /// Queues [`Drive::is_locked`].
    pub fn is_locked(&self) -> Pending<bool> {
        self.submit(|drive| drive.is_locked())
    }

    /// Queues [`Drive::is_error`].
    pub fn is_error(&self) -> Pending<bool> {
        self.submit(|drive| drive.is_error())
    }

    /// Queues [`Drive::is_ready`].
    pub fn is_ready(&self) -> Pending<bool> {
        self.submit(|drive| drive.is_ready())
    }

    /// Unlocks in the direct profile and runs the reference search, as one job.
    pub fn homing(&self) -> Pending<()> {
        self.submit(|drive| {
            drive.unlock(Profile::Direct)?;
            drive.home()
        })
    }

    /// Moves to `value` user units, scaled by the coefficient.
    pub fn travel_to(&self, value: f64) -> Pending<()> {
        let speed = self.travel_speed;
        match to_drive_units(value, self.coefficient) {
            Ok(target) => self.position_to(target, speed),
            Err(e) => self.failed(e),
        }
    }

    /// Reads the actual position in user units.
    pub fn travel_position(&self) -> Pending<f64> {
        let coefficient = self.coefficient;
        self.submit(move |drive| {
            let position = drive.read_position()?;
            Ok(f64::from(position) / coefficient)
        })
    }

    /// Moves to a level of the configured layout.
    ///
    /// Fails with `InvalidParameter` without touching the drive if no layout
    /// is configured or the level is out of range.
    pub fn move_to_level(&self, level: u32, speed: u8) -> Pending<()> {
        let target = self
            .levels
            .ok_or_else(|| FhppError::invalid_parameter("levels", "no level layout configured"))
            .and_then(|levels| levels.height_of(level))
            .and_then(|height| to_drive_units(height, self.coefficient));
        match target {
            Ok(target) => self.position_to(target, speed),
            Err(e) => self.failed(e),
        }
    }

    /// Installs the positioning observer on the engine.
    pub fn set_observer(&self, observer: impl PositionObserver + 'static) {
        self.drive.set_observer(observer);
    }

    /// Cancels the running operation and everything queued so far, without
    /// waiting in the queue.
    ///
    /// See [`Drive::force_cancel`].
    pub fn force_cancel(&self) -> Result<()> {
        self.drive.force_cancel()
    }

    /// Clears the cancellation flag without waiting in the queue.
    ///
    /// Queued jobs clear it themselves; this is only needed before calling
    /// the engine directly through [`drive`](AsyncDrive::drive).
    pub fn reset_cancel(&self) {
        self.drive.reset_cancel();
    }

    fn failed<R>(&self, e: FhppError) -> Pending<R> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(e));
        Pending { rx }
    }
}

fn run_jobs<T: RegisterTransport>(drive: Arc<Drive<T>>, queue: Receiver<Job<T>>) {
    debug!("drive worker started");
    for job in queue.iter() {
        job(&drive);
    }
    debug!("drive worker stopped");
}

fn check_coefficient(coefficient: f64) -> Result<f64> {
    if !coefficient.is_finite() || coefficient <= 0.0 {
        return Err(FhppError::invalid_parameter(
            "coefficient",
            format!("must be a positive number, got {}", coefficient),
        ));
    }
    Ok(coefficient)
}

fn to_drive_units(value: f64, coefficient: f64) -> Result<i32> {
    check_coefficient(coefficient)?;
    let scaled = (value * coefficient).round();
    if !scaled.is_finite() || scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
        return Err(FhppError::invalid_parameter(
            "value",
            format!("{} x {} is out of the drive range", value, coefficient),
        ));
    }
    Ok(scaled as i32)
}

impl<T: RegisterTransport + 'static> Drop for AsyncDrive<T> {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop after the queued jobs.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("drive worker panicked");
            }
        }
    }
}

impl<T: RegisterTransport + std::fmt::Debug + 'static> std::fmt::Debug for AsyncDrive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDrive")
            .field("drive", &self.drive)
            .field("coefficient", &self.coefficient)
            .field("travel_speed", &self.travel_speed)
            .field("levels", &self.levels)
            .finish()
    }
}

//! FHPP status bytes reported by the drive.
//!
//! Status bytes mirror the control bytes: [`Scon`], [`Spos`] and, in the
//! direct profile, [`Sdir`]. A decoded triple is kept as a [`DriveStatus`],
//! which is what the engine attaches to errors and derives states from.
//!
//! # Example
//!
//! ```
//! use festo_fhpp::{DriveState, DriveStatus, OperatingMode, Scon, Sdir, Spos};
//!
//! let status = DriveStatus::new(
//!     Scon::DRIVE_ENABLED | Scon::OPERATION_ENABLED | Scon::DIRECT_MODE,
//!     Spos::HALT_RELEASED | Spos::MOTION_COMPLETE | Spos::REFERENCED,
//!     Sdir::empty(),
//! );
//! assert_eq!(status.scon.operating_mode(), OperatingMode::Direct);
//! assert_eq!(status.state(), DriveState::Ready);
//! ```

use std::fmt;

use bitflags::bitflags;

use crate::control::ControlMode;
use crate::utils::write_flags;

bitflags! {
    /// Status byte 1 (SCON).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Scon: u8 {
        /// Drive controller enabled.
        const DRIVE_ENABLED     = 0x01;
        /// Operation enabled, positioning possible.
        const OPERATION_ENABLED = 0x02;
        /// Warning registered.
        const WARNING           = 0x04;
        /// Fault present or fault reaction active.
        const FAULT             = 0x08;
        /// Load voltage applied.
        const LOAD_VOLTAGE      = 0x10;
        /// Device control held by software (FCT or DIN), PLC control locked.
        const EXTERNALLY_LOCKED = 0x20;
        /// Operating mode bit 1, direct profile active.
        const DIRECT_MODE       = 0x40;
        /// Operating mode bit 2 (reserved).
        const OPM2              = 0x80;
    }
}

/// Operating mode carried in bits 6-7 of SCON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    /// Record selection profile.
    RecordSelection,
    /// Direct profile.
    Direct,
    /// Any reserved combination.
    Reserved,
}

impl Scon {
    /// Returns whether a fault or a warning is present.
    pub fn has_fault_or_warning(self) -> bool {
        self.intersects(Self::FAULT | Self::WARNING)
    }

    /// Returns the active operating mode.
    pub fn operating_mode(self) -> OperatingMode {
        match (self.contains(Self::DIRECT_MODE), self.contains(Self::OPM2)) {
            (false, false) => OperatingMode::RecordSelection,
            (true, false) => OperatingMode::Direct,
            _ => OperatingMode::Reserved,
        }
    }
}

impl fmt::Display for Scon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(
            f,
            "SCON",
            &[
                ("OPM2", self.contains(Self::OPM2)),
                ("OPM1", self.contains(Self::DIRECT_MODE)),
                ("FCT", self.contains(Self::EXTERNALLY_LOCKED)),
                ("VLoad", self.contains(Self::LOAD_VOLTAGE)),
                ("Fault", self.contains(Self::FAULT)),
                ("Warn", self.contains(Self::WARNING)),
                ("OpEn", self.contains(Self::OPERATION_ENABLED)),
                ("Enable", self.contains(Self::DRIVE_ENABLED)),
            ],
        )
    }
}

bitflags! {
    /// Status byte 2 (SPOS).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Spos: u8 {
        /// Halt not active, axis can be moved.
        const HALT_RELEASED   = 0x01;
        /// Start (positioning, homing, jog) acknowledged.
        const ACK             = 0x02;
        /// Positioning task completed, possibly with error.
        const MOTION_COMPLETE = 0x04;
        /// Teach carried out.
        const TEACH_DONE      = 0x08;
        /// Axis speed at or above the standstill limit.
        const MOVING          = 0x10;
        /// Following error active.
        const FOLLOWING_ERROR = 0x20;
        /// Axis left the tolerance window after motion complete.
        const SETTLED         = 0x40;
        /// Reference information present, homing not necessary.
        const REFERENCED      = 0x80;
    }
}

impl fmt::Display for Spos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(
            f,
            "SPOS",
            &[
                ("Ref", self.contains(Self::REFERENCED)),
                ("Still", self.contains(Self::SETTLED)),
                ("FolErr", self.contains(Self::FOLLOWING_ERROR)),
                ("Mov", self.contains(Self::MOVING)),
                ("Teach", self.contains(Self::TEACH_DONE)),
                ("MC", self.contains(Self::MOTION_COMPLETE)),
                ("Ack", self.contains(Self::ACK)),
                ("nHalt", self.contains(Self::HALT_RELEASED)),
            ],
        )
    }
}

bitflags! {
    /// Status byte 3 (SDIR), direct profile only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Sdir: u8 {
        /// Setpoint is relative.
        const RELATIVE       = 0x01;
        /// Control mode bit 1 (torque).
        const MODE_TORQUE    = 0x02;
        /// Control mode bit 2 (velocity).
        const MODE_VELOCITY  = 0x04;
        /// Speed limit reached.
        const VELOCITY_LIMIT = 0x10;
        /// Stroke limit reached.
        const STROKE_LIMIT   = 0x20;
    }
}

impl Sdir {
    /// Returns the acknowledged control mode (position for the reserved value).
    pub fn control_mode(self) -> ControlMode {
        ControlMode::from_byte(self.bits()).unwrap_or_default()
    }
}

impl fmt::Display for Sdir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(
            f,
            "SDIR",
            &[
                ("XLim", self.contains(Self::STROKE_LIMIT)),
                ("VLim", self.contains(Self::VELOCITY_LIMIT)),
                ("Velo", self.contains(Self::MODE_VELOCITY)),
                ("Torq", self.contains(Self::MODE_TORQUE)),
                ("Rel", self.contains(Self::RELATIVE)),
            ],
        )
    }
}

/// State of the drive as derived from one status observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveState {
    /// Fault or warning present.
    Faulted,
    /// Drive controller disabled.
    Locked,
    /// Drive enabled, operation not yet enabled.
    Unlocking,
    /// Task active on an unreferenced axis.
    Homing,
    /// Task active on a referenced axis.
    Positioning,
    /// Enabled with no active task.
    Ready,
}

impl fmt::Display for DriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriveState::Faulted => "faulted",
            DriveState::Locked => "locked",
            DriveState::Unlocking => "unlocking",
            DriveState::Homing => "homing",
            DriveState::Positioning => "positioning",
            DriveState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// One decoded set of status bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DriveStatus {
    /// Status byte 1.
    pub scon: Scon,
    /// Status byte 2.
    pub spos: Spos,
    /// Status byte 3 (empty in the record selection profile).
    pub sdir: Sdir,
}

impl DriveStatus {
    /// Creates a status from its three bytes.
    pub fn new(scon: Scon, spos: Spos, sdir: Sdir) -> Self {
        Self { scon, spos, sdir }
    }

    /// Returns whether a fault or warning is present.
    pub fn has_fault_or_warning(&self) -> bool {
        self.scon.has_fault_or_warning()
    }

    /// Returns whether drive and operation are both enabled.
    pub fn is_enabled(&self) -> bool {
        self.scon
            .contains(Scon::DRIVE_ENABLED | Scon::OPERATION_ENABLED)
    }

    /// Returns whether the drive is enabled in direct mode with halt released.
    pub fn is_direct_ready(&self) -> bool {
        self.is_enabled()
            && self.scon.operating_mode() == OperatingMode::Direct
            && self.spos.contains(Spos::HALT_RELEASED)
    }

    /// Returns whether a start was acknowledged and the task is running.
    pub fn is_acknowledged(&self) -> bool {
        self.spos.contains(Spos::ACK) && !self.spos.contains(Spos::MOTION_COMPLETE)
    }

    /// Returns whether the positioning task is complete.
    pub fn is_motion_complete(&self) -> bool {
        self.spos.contains(Spos::MOTION_COMPLETE)
    }

    /// Returns whether the axis is referenced.
    pub fn is_referenced(&self) -> bool {
        self.spos.contains(Spos::REFERENCED)
    }

    /// Derives the drive state.
    ///
    /// Cancellation is an outcome of an engine operation and is never
    /// derived from status bits.
    pub fn state(&self) -> DriveState {
        if self.has_fault_or_warning() {
            DriveState::Faulted
        } else if !self.scon.contains(Scon::DRIVE_ENABLED) {
            DriveState::Locked
        } else if !self.scon.contains(Scon::OPERATION_ENABLED) {
            DriveState::Unlocking
        } else if !self.is_motion_complete() {
            if self.is_referenced() {
                DriveState::Positioning
            } else {
                DriveState::Homing
            }
        } else {
            DriveState::Ready
        }
    }
}

impl fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "{}", self.scon)?;
            writeln!(f, "{}", self.spos)?;
            write!(f, "{}", self.sdir)
        } else {
            write!(
                f,
                "SCON 0x{:02X}, SPOS 0x{:02X}, SDIR 0x{:02X}, {}",
                self.scon.bits(),
                self.spos.bits(),
                self.sdir.bits(),
                self.state()
            )
        }
    }
}

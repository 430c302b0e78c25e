//! FHPP control bytes written by the controller.
//!
//! Every FHPP request frame starts with up to three control bytes:
//!
//! | Byte | Type | Used in |
//! |------|------|---------|
//! | 0 | [`Ccon`] | both profiles |
//! | 1 | [`Cpos`] | both profiles |
//! | 2 | [`Cdir`] | direct profile only (record number otherwise) |
//!
//! # Example
//!
//! ```
//! use festo_fhpp::{Ccon, Cdir, ControlMode, Cpos};
//!
//! let ccon = Ccon::DRIVE_ENABLE | Ccon::OPERATION_ENABLE | Ccon::DIRECT_MODE;
//! let cpos = Cpos::HALT_RELEASED | Cpos::START;
//! let cdir = Cdir::with_control_mode(ControlMode::Position);
//!
//! assert_eq!(ccon.bits(), 0x43);
//! assert_eq!(cpos.bits(), 0x03);
//! assert_eq!(cdir.control_mode(), ControlMode::Position);
//! ```

use std::fmt;

use bitflags::bitflags;

use crate::utils::write_flags;

bitflags! {
    /// Control byte 1 (CCON).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Ccon: u8 {
        /// Enable the drive controller.
        const DRIVE_ENABLE     = 0x01;
        /// Enable operation. Clearing it stops with the emergency ramp and
        /// discards the positioning task.
        const OPERATION_ENABLE = 0x02;
        /// Release the brake.
        const BRAKE_RELEASE    = 0x04;
        /// Acknowledge a fault on the rising edge.
        const FAULT_RESET      = 0x08;
        /// Observe only, do not take over device control.
        const CONTROL_LOCK     = 0x20;
        /// Operating mode bit 1, selects the direct profile.
        const DIRECT_MODE      = 0x40;
        /// Operating mode bit 2 (reserved).
        const OPM2             = 0x80;
    }
}

impl Ccon {
    /// Drive and operation enabled, the base of every motion frame.
    pub const ENABLED: Self = Self::DRIVE_ENABLE.union(Self::OPERATION_ENABLE);
}

impl fmt::Display for Ccon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(
            f,
            "CCON",
            &[
                ("OPM2", self.contains(Self::OPM2)),
                ("Direct", self.contains(Self::DIRECT_MODE)),
                ("Lock", self.contains(Self::CONTROL_LOCK)),
                ("Reset", self.contains(Self::FAULT_RESET)),
                ("Brake", self.contains(Self::BRAKE_RELEASE)),
                ("OpEn", self.contains(Self::OPERATION_ENABLE)),
                ("Enable", self.contains(Self::DRIVE_ENABLE)),
            ],
        )
    }
}

bitflags! {
    /// Control byte 2 (CPOS).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Cpos: u8 {
        /// Halt not active. Clearing it stops on the braking ramp but keeps
        /// the positioning task.
        const HALT_RELEASED = 0x01;
        /// Rising edge transfers the setpoint and starts positioning.
        const START         = 0x02;
        /// Rising edge starts homing.
        const HOME          = 0x04;
        /// Jog towards larger positions while set.
        const JOG_POSITIVE  = 0x08;
        /// Jog towards smaller positions while set.
        const JOG_NEGATIVE  = 0x10;
        /// Falling edge teaches the actual position into the current record.
        const TEACH         = 0x20;
        /// Rising edge in halt deletes the positioning task.
        const CLEAR_TASK    = 0x40;
    }
}

impl fmt::Display for Cpos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(
            f,
            "CPOS",
            &[
                ("Clear", self.contains(Self::CLEAR_TASK)),
                ("Teach", self.contains(Self::TEACH)),
                ("JogN", self.contains(Self::JOG_NEGATIVE)),
                ("JogP", self.contains(Self::JOG_POSITIVE)),
                ("Home", self.contains(Self::HOME)),
                ("Start", self.contains(Self::START)),
                ("nHalt", self.contains(Self::HALT_RELEASED)),
            ],
        )
    }
}

/// Control mode carried in bits 1-2 of CDIR and SDIR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlMode {
    /// Profile position mode.
    #[default]
    Position,
    /// Profile torque mode (torque, current).
    Torque,
    /// Profile velocity mode.
    Velocity,
}

impl ControlMode {
    /// Mask of the two control mode bits.
    pub const MASK: u8 = 0x06;

    /// Returns the control mode bits in byte position.
    pub fn bits(self) -> u8 {
        match self {
            ControlMode::Position => 0x00,
            ControlMode::Torque => 0x02,
            ControlMode::Velocity => 0x04,
        }
    }

    /// Decodes the control mode from a CDIR/SDIR byte.
    ///
    /// The reserved combination `11` is reported as `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte & Self::MASK {
            0x00 => Some(ControlMode::Position),
            0x02 => Some(ControlMode::Torque),
            0x04 => Some(ControlMode::Velocity),
            _ => None,
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Position => write!(f, "position"),
            ControlMode::Torque => write!(f, "torque"),
            ControlMode::Velocity => write!(f, "velocity"),
        }
    }
}

bitflags! {
    /// Control byte 3 (CDIR), direct profile only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Cdir: u8 {
        /// Setpoint is relative to the previous setpoint.
        const RELATIVE             = 0x01;
        /// Control mode bit 1 (torque).
        const MODE_TORQUE          = 0x02;
        /// Control mode bit 2 (velocity).
        const MODE_VELOCITY        = 0x04;
        /// Disable stroke limit monitoring.
        const STROKE_LIMIT_DISABLE = 0x20;
    }
}

impl Cdir {
    /// Creates a CDIR byte selecting the given control mode, absolute setpoint.
    pub fn with_control_mode(mode: ControlMode) -> Self {
        Self::from_bits_truncate(mode.bits())
    }

    /// Returns the selected control mode (position for the reserved value).
    pub fn control_mode(self) -> ControlMode {
        ControlMode::from_byte(self.bits()).unwrap_or_default()
    }
}

impl fmt::Display for Cdir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(
            f,
            "CDIR",
            &[
                ("XLim", self.contains(Self::STROKE_LIMIT_DISABLE)),
                ("Velo", self.contains(Self::MODE_VELOCITY)),
                ("Torq", self.contains(Self::MODE_TORQUE)),
                ("Rel", self.contains(Self::RELATIVE)),
            ],
        )?;
        write!(f, " ({})", self.control_mode())
    }
}

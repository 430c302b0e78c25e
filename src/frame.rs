//! FHPP register frames.
//!
//! Every FHPP exchange moves exactly [`FRAME_WORDS`] holding registers
//! starting at [`FRAME_ADDRESS`]. This module converts between named flag
//! sets and those four words. It does no I/O and keeps no state.
//!
//! # Layout
//!
//! Each register carries two FHPP bytes, the first in the low byte. The
//! 32-bit value of the direct profile occupies registers 2 and 3 with the
//! high half in register 2.
//!
//! | Register | Record selection (out / in) | Direct (out / in) |
//! |----------|-----------------------------|-------------------|
//! | 0 | CCON, CPOS / SCON, SPOS | CCON, CPOS / SCON, SPOS |
//! | 1 | record number / record status | CDIR, speed / SDIR, speed |
//! | 2 | reserved | setpoint high / actual high |
//! | 3 | reserved | setpoint low / actual low |
//!
//! # Example
//!
//! ```
//! use festo_fhpp::frame::{decode_direct, encode_direct};
//! use festo_fhpp::{Ccon, Cdir, Cpos};
//!
//! let words = encode_direct(
//!     Ccon::ENABLED | Ccon::DIRECT_MODE,
//!     Cpos::HALT_RELEASED | Cpos::START,
//!     Cdir::empty(),
//!     255,
//!     15000,
//! );
//! assert_eq!(words, [0x0343, 0xFF00, 0x0000, 0x3A98]);
//!
//! // A status frame uses the same layout.
//! let status = decode_direct(&words).unwrap();
//! assert_eq!(status.speed, 255);
//! assert_eq!(status.position, 15000);
//! ```

use crate::control::{Ccon, Cdir, Cpos};
use crate::error::{FhppError, Result};
use crate::status::{DriveStatus, Scon, Sdir, Spos};
use crate::utils::{high_byte, join_i32, low_byte, pack_bytes, split_i32};

/// Number of registers in every FHPP frame.
pub const FRAME_WORDS: usize = 4;

/// Register address of the FHPP frame.
pub const FRAME_ADDRESS: u16 = 0;

/// Record selection request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordSelectRequest {
    /// Control byte 1.
    pub ccon: Ccon,
    /// Control byte 2.
    pub cpos: Cpos,
    /// Number of the stored positioning record.
    pub record: u8,
}

impl RecordSelectRequest {
    /// Creates a new record selection request.
    pub fn new(ccon: Ccon, cpos: Cpos, record: u8) -> Self {
        Self { ccon, cpos, record }
    }

    /// Packs the request into register words.
    pub fn to_words(self) -> [u16; FRAME_WORDS] {
        [
            pack_bytes(self.ccon.bits(), self.cpos.bits()),
            pack_bytes(self.record, 0),
            0,
            0,
        ]
    }

    /// Unpacks a request frame.
    ///
    /// # Errors
    ///
    /// Returns `FhppError::MalformedFrame` if `words` is not 4 words long.
    pub fn from_words(words: &[u16]) -> Result<Self> {
        let words = check_len(words)?;
        Ok(Self {
            ccon: Ccon::from_bits_retain(low_byte(words[0])),
            cpos: Cpos::from_bits_retain(high_byte(words[0])),
            record: low_byte(words[1]),
        })
    }
}

/// Direct profile request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectRequest {
    /// Control byte 1.
    pub ccon: Ccon,
    /// Control byte 2.
    pub cpos: Cpos,
    /// Control byte 3.
    pub cdir: Cdir,
    /// Speed setpoint in percent of the maximum (`v1`).
    pub speed: u8,
    /// Position, velocity or torque setpoint depending on the control mode (`v2`).
    pub setpoint: i32,
}

impl DirectRequest {
    /// Creates a new direct request without setpoints.
    pub fn new(ccon: Ccon, cpos: Cpos) -> Self {
        Self {
            ccon,
            cpos,
            ..Self::default()
        }
    }

    /// Sets the speed and setpoint values.
    pub fn with_setpoint(mut self, speed: u8, setpoint: i32) -> Self {
        self.speed = speed;
        self.setpoint = setpoint;
        self
    }

    /// Sets the CDIR byte.
    pub fn with_cdir(mut self, cdir: Cdir) -> Self {
        self.cdir = cdir;
        self
    }

    /// Packs the request into register words.
    pub fn to_words(self) -> [u16; FRAME_WORDS] {
        let (high, low) = split_i32(self.setpoint);
        [
            pack_bytes(self.ccon.bits(), self.cpos.bits()),
            pack_bytes(self.cdir.bits(), self.speed),
            high,
            low,
        ]
    }

    /// Unpacks a request frame.
    ///
    /// # Errors
    ///
    /// Returns `FhppError::MalformedFrame` if `words` is not 4 words long.
    pub fn from_words(words: &[u16]) -> Result<Self> {
        let words = check_len(words)?;
        Ok(Self {
            ccon: Ccon::from_bits_retain(low_byte(words[0])),
            cpos: Cpos::from_bits_retain(high_byte(words[0])),
            cdir: Cdir::from_bits_retain(low_byte(words[1])),
            speed: high_byte(words[1]),
            setpoint: join_i32(words[2], words[3]),
        })
    }
}

/// Decoded record selection status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordSelectStatus {
    /// Status byte 1.
    pub scon: Scon,
    /// Status byte 2.
    pub spos: Spos,
    /// Record status byte.
    pub record_status: u8,
}

impl RecordSelectStatus {
    /// Returns the status bytes as a [`DriveStatus`].
    pub fn drive_status(&self) -> DriveStatus {
        DriveStatus::new(self.scon, self.spos, Sdir::empty())
    }

    /// Packs the status into register words, as a drive would report it.
    pub fn to_words(self) -> [u16; FRAME_WORDS] {
        [
            pack_bytes(self.scon.bits(), self.spos.bits()),
            pack_bytes(self.record_status, 0),
            0,
            0,
        ]
    }
}

/// Decoded direct profile status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectStatus {
    /// Status byte 1.
    pub scon: Scon,
    /// Status byte 2.
    pub spos: Spos,
    /// Status byte 3.
    pub sdir: Sdir,
    /// Actual speed in percent (`v1`).
    pub speed: u8,
    /// Actual position, velocity or torque (`v2`).
    pub position: i32,
}

impl DirectStatus {
    /// Returns the status bytes as a [`DriveStatus`].
    pub fn drive_status(&self) -> DriveStatus {
        DriveStatus::new(self.scon, self.spos, self.sdir)
    }

    /// Packs the status into register words, as a drive would report it.
    pub fn to_words(self) -> [u16; FRAME_WORDS] {
        let (high, low) = split_i32(self.position);
        [
            pack_bytes(self.scon.bits(), self.spos.bits()),
            pack_bytes(self.sdir.bits(), self.speed),
            high,
            low,
        ]
    }
}

/// Encodes a record selection request.
pub fn encode_record_select(ccon: Ccon, cpos: Cpos, record: u8) -> [u16; FRAME_WORDS] {
    RecordSelectRequest::new(ccon, cpos, record).to_words()
}

/// Encodes a direct profile request.
pub fn encode_direct(ccon: Ccon, cpos: Cpos, cdir: Cdir, v1: u8, v2: i32) -> [u16; FRAME_WORDS] {
    DirectRequest::new(ccon, cpos)
        .with_cdir(cdir)
        .with_setpoint(v1, v2)
        .to_words()
}

/// Decodes a record selection status frame.
///
/// # Errors
///
/// Returns `FhppError::MalformedFrame` if `words` is not 4 words long.
///
/// # Example
///
/// ```
/// use festo_fhpp::frame::decode_record_select;
/// use festo_fhpp::{FhppError, Scon, Spos};
///
/// let status = decode_record_select(&[0x8403, 0x0005, 0, 0]).unwrap();
/// assert_eq!(status.scon, Scon::DRIVE_ENABLED | Scon::OPERATION_ENABLED);
/// assert_eq!(status.spos, Spos::MOTION_COMPLETE | Spos::REFERENCED);
/// assert_eq!(status.record_status, 5);
///
/// let err = decode_record_select(&[0x8403]).unwrap_err();
/// assert!(matches!(err, FhppError::MalformedFrame { expected: 4, actual: 1 }));
/// ```
pub fn decode_record_select(words: &[u16]) -> Result<RecordSelectStatus> {
    let words = check_len(words)?;
    Ok(RecordSelectStatus {
        scon: Scon::from_bits_retain(low_byte(words[0])),
        spos: Spos::from_bits_retain(high_byte(words[0])),
        record_status: low_byte(words[1]),
    })
}

/// Decodes a direct profile status frame.
///
/// # Errors
///
/// Returns `FhppError::MalformedFrame` if `words` is not 4 words long.
pub fn decode_direct(words: &[u16]) -> Result<DirectStatus> {
    let words = check_len(words)?;
    Ok(DirectStatus {
        scon: Scon::from_bits_retain(low_byte(words[0])),
        spos: Spos::from_bits_retain(high_byte(words[0])),
        sdir: Sdir::from_bits_retain(low_byte(words[1])),
        speed: high_byte(words[1]),
        position: join_i32(words[2], words[3]),
    })
}

fn check_len(words: &[u16]) -> Result<&[u16]> {
    if words.len() != FRAME_WORDS {
        return Err(FhppError::malformed_frame(FRAME_WORDS, words.len()));
    }
    Ok(words)
}

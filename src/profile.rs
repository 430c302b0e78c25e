//! FHPP control profiles.
//!
//! A Festo drive is controlled either by selecting stored positioning records
//! ([`Profile::RecordSelect`]) or by writing setpoints directly every cycle
//! ([`Profile::Direct`]). The profile decides how register 1 of a frame is
//! interpreted and which operating mode bits are set in CCON.
//!
//! | Profile | CCON mode bits | Register 1 out | Register 1 in |
//! |---------|----------------|----------------|---------------|
//! | RecordSelect | `00` | record number | record status |
//! | Direct | `01` | CDIR, speed | SDIR, speed |
//!
//! # Example
//!
//! ```
//! use festo_fhpp::{Ccon, OperatingMode, Profile};
//!
//! assert_eq!(Profile::Direct.mode_bits(), Ccon::DIRECT_MODE);
//! assert_eq!(Profile::from_operating_mode(OperatingMode::RecordSelection), Profile::RecordSelect);
//! assert_eq!(Profile::Direct.to_string(), "direct");
//! ```

use crate::control::Ccon;
use crate::status::OperatingMode;

/// FHPP control profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Profile {
    /// Record selection: start stored records by number.
    RecordSelect,
    /// Direct mode: position, speed and control mode written each cycle.
    #[default]
    Direct,
}

impl Profile {
    /// Returns the CCON operating mode bits selecting this profile.
    pub fn mode_bits(self) -> Ccon {
        match self {
            Profile::RecordSelect => Ccon::empty(),
            Profile::Direct => Ccon::DIRECT_MODE,
        }
    }

    /// Returns the profile matching an operating mode reported in SCON.
    ///
    /// Reserved modes are treated as record selection, the drive's power-up
    /// default.
    pub fn from_operating_mode(mode: OperatingMode) -> Self {
        match mode {
            OperatingMode::Direct => Profile::Direct,
            OperatingMode::RecordSelection | OperatingMode::Reserved => Profile::RecordSelect,
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::RecordSelect => write!(f, "record selection"),
            Profile::Direct => write!(f, "direct"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bits() {
        assert_eq!(Profile::RecordSelect.mode_bits(), Ccon::empty());
        assert_eq!(Profile::Direct.mode_bits(), Ccon::DIRECT_MODE);
    }

    #[test]
    fn test_from_operating_mode() {
        assert_eq!(
            Profile::from_operating_mode(OperatingMode::Direct),
            Profile::Direct
        );
        assert_eq!(
            Profile::from_operating_mode(OperatingMode::Reserved),
            Profile::RecordSelect
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Profile::RecordSelect.to_string(), "record selection");
        assert_eq!(Profile::Direct.to_string(), "direct");
    }

    #[test]
    fn test_default_is_direct() {
        assert_eq!(Profile::default(), Profile::Direct);
    }
}

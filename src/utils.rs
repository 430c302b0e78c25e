//! Helpers for packing FHPP bytes into register words and formatting them.
//!
//! FHPP frames are byte oriented while Modbus moves 16-bit registers. Within
//! one register the first FHPP byte sits in the low byte and the second in
//! the high byte. 32-bit setpoints span two registers, high half first.
//!
//! # Example
//!
//! ```
//! use festo_fhpp::utils::{high_byte, join_i32, low_byte, pack_bytes, split_i32};
//!
//! let word = pack_bytes(0x43, 0x01);
//! assert_eq!(word, 0x0143);
//! assert_eq!(low_byte(word), 0x43);
//! assert_eq!(high_byte(word), 0x01);
//!
//! let (hi, lo) = split_i32(-2);
//! assert_eq!((hi, lo), (0xFFFF, 0xFFFE));
//! assert_eq!(join_i32(hi, lo), -2);
//! ```

use std::fmt;

/// Builds a register word from its low and high bytes.
///
/// # Example
///
/// ```
/// use festo_fhpp::utils::pack_bytes;
///
/// assert_eq!(pack_bytes(0x01, 0x80), 0x8001);
/// ```
#[inline]
pub fn pack_bytes(low: u8, high: u8) -> u16 {
    u16::from(low) | (u16::from(high) << 8)
}

/// Returns the low byte of a register word.
#[inline]
pub fn low_byte(word: u16) -> u8 {
    (word & 0xFF) as u8
}

/// Returns the high byte of a register word.
#[inline]
pub fn high_byte(word: u16) -> u8 {
    (word >> 8) as u8
}

/// Splits a signed 32-bit value into `(high, low)` register words.
///
/// # Example
///
/// ```
/// use festo_fhpp::utils::split_i32;
///
/// assert_eq!(split_i32(15000), (0x0000, 0x3A98));
/// assert_eq!(split_i32(0x0001_0002), (0x0001, 0x0002));
/// ```
#[inline]
pub fn split_i32(value: i32) -> (u16, u16) {
    let raw = value as u32;
    ((raw >> 16) as u16, (raw & 0xFFFF) as u16)
}

/// Joins `(high, low)` register words into a signed 32-bit value.
#[inline]
pub fn join_i32(high: u16, low: u16) -> i32 {
    ((u32::from(high) << 16) | u32::from(low)) as i32
}

/// Formats a 16-bit word as hexadecimal.
///
/// # Example
///
/// ```
/// use festo_fhpp::utils::format_hex;
///
/// assert_eq!(format_hex(0x1234), "0x1234");
/// ```
pub fn format_hex(value: u16) -> String {
    format!("0x{:04X}", value)
}

/// Formats a register frame as space separated hexadecimal words.
///
/// # Example
///
/// ```
/// use festo_fhpp::utils::format_words;
///
/// assert_eq!(format_words(&[0x0143, 0x00FF, 0, 0x3A98]), "0143 00FF 0000 3A98");
/// ```
pub fn format_words(words: &[u16]) -> String {
    words
        .iter()
        .map(|w| format!("{:04X}", w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes a one-line flag table such as `SCON [x]Enable [ ]OpEn`.
///
/// Used by the `Display` impls of the control and status byte types.
pub(crate) fn write_flags(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    flags: &[(&str, bool)],
) -> fmt::Result {
    write!(f, "{}", name)?;
    for (label, on) in flags {
        write!(f, " [{}]{}", if *on { 'x' } else { ' ' }, label)?;
    }
    Ok(())
}

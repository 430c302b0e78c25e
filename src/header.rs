//! Modbus TCP application header (MBAP).
//!
//! Every Modbus TCP request and response starts with a 7-byte MBAP header:
//!
//! | Bytes | Field | Description |
//! |-------|-------|-------------|
//! | 0-1 | Transaction ID | Echoed by the server, matches responses to requests |
//! | 2-3 | Protocol ID | Always 0 for Modbus |
//! | 4-5 | Length | Number of following bytes (unit ID + PDU) |
//! | 6 | Unit ID | Addressed unit behind a gateway |
//!
//! All fields are big-endian.
//!
//! # Example
//!
//! ```
//! use festo_fhpp::MbapHeader;
//!
//! let header = MbapHeader::new(0x0001, 0, 6);
//! assert_eq!(header.to_bytes(), [0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x00]);
//! ```

use crate::error::{FhppError, Result};

/// MBAP header size in bytes.
pub const MBAP_HEADER_SIZE: usize = 7;

/// Modbus protocol identifier.
pub const MODBUS_PROTOCOL_ID: u16 = 0;

/// Largest value of the length field (unit ID + 253-byte PDU).
pub const MAX_MBAP_LENGTH: u16 = 254;

/// Modbus TCP application header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    /// Transaction identifier.
    pub transaction_id: u16,
    /// Protocol identifier (0 for Modbus).
    pub protocol_id: u16,
    /// Number of bytes following the length field.
    pub length: u16,
    /// Unit identifier.
    pub unit_id: u8,
}

impl MbapHeader {
    /// Creates a request header for a PDU of `pdu_len` bytes.
    pub fn new(transaction_id: u16, unit_id: u8, pdu_len: usize) -> Self {
        Self {
            transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            length: (pdu_len + 1) as u16,
            unit_id,
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(self) -> [u8; MBAP_HEADER_SIZE] {
        let tid = self.transaction_id.to_be_bytes();
        let pid = self.protocol_id.to_be_bytes();
        let len = self.length.to_be_bytes();
        [tid[0], tid[1], pid[0], pid[1], len[0], len[1], self.unit_id]
    }

    /// Parses a header from bytes.
    ///
    /// # Errors
    ///
    /// Returns `FhppError::InvalidResponse` if the slice is too short, the
    /// protocol ID is not 0, or the length field is out of range.
    ///
    /// # Example
    ///
    /// ```
    /// use festo_fhpp::MbapHeader;
    ///
    /// let header = MbapHeader::from_bytes(&[0x12, 0x34, 0x00, 0x00, 0x00, 0x0B, 0x01]).unwrap();
    /// assert_eq!(header.transaction_id, 0x1234);
    /// assert_eq!(header.pdu_len(), 10);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MBAP_HEADER_SIZE {
            return Err(FhppError::invalid_response(format!(
                "header too short: expected {} bytes, got {}",
                MBAP_HEADER_SIZE,
                data.len()
            )));
        }

        let header = Self {
            transaction_id: u16::from_be_bytes([data[0], data[1]]),
            protocol_id: u16::from_be_bytes([data[2], data[3]]),
            length: u16::from_be_bytes([data[4], data[5]]),
            unit_id: data[6],
        };

        if header.protocol_id != MODBUS_PROTOCOL_ID {
            return Err(FhppError::invalid_response(format!(
                "unexpected protocol id 0x{:04X}",
                header.protocol_id
            )));
        }
        if header.length < 2 || header.length > MAX_MBAP_LENGTH {
            return Err(FhppError::invalid_response(format!(
                "length field out of range: {}",
                header.length
            )));
        }

        Ok(header)
    }

    /// Returns the size of the PDU that follows the header.
    pub fn pdu_len(self) -> usize {
        usize::from(self.length).saturating_sub(1)
    }
}

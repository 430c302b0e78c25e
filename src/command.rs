//! Modbus TCP request frames.
//!
//! The FHPP engine needs three Modbus functions, each with its own command
//! type that validates its parameters and serializes the full request
//! (MBAP header + PDU):
//!
//! - [`ReadRegistersCommand`] - Read Holding Registers (0x03)
//! - [`WriteRegistersCommand`] - Write Multiple Registers (0x10)
//! - [`ReadWriteRegistersCommand`] - Read/Write Multiple Registers (0x17)
//!
//! # Example
//!
//! ```
//! use festo_fhpp::ReadRegistersCommand;
//!
//! let cmd = ReadRegistersCommand::new(0x0001, 0, 0, 4).unwrap();
//! assert_eq!(
//!     cmd.to_bytes(),
//!     vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x03, 0x00, 0x00, 0x00, 0x04]
//! );
//! ```

use crate::error::{FhppError, Result};
use crate::header::{MbapHeader, MBAP_HEADER_SIZE};

/// Read Holding Registers function code.
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
/// Write Multiple Registers function code.
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
/// Read/Write Multiple Registers function code.
pub const FC_READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;

/// Maximum number of registers per read request.
pub const MAX_READ_REGISTERS: u16 = 125;
/// Maximum number of registers per write request.
pub const MAX_WRITE_REGISTERS: u16 = 123;
/// Maximum number of registers written by a read/write request.
pub const MAX_READ_WRITE_REGISTERS: u16 = 121;

fn check_count(parameter: &str, count: usize, max: u16) -> Result<u16> {
    if count == 0 {
        return Err(FhppError::invalid_parameter(
            parameter,
            "must be greater than 0",
        ));
    }
    if count > usize::from(max) {
        return Err(FhppError::invalid_parameter(
            parameter,
            format!("must not exceed {}", max),
        ));
    }
    Ok(count as u16)
}

fn push_words(bytes: &mut Vec<u8>, words: &[u16]) {
    bytes.push((words.len() * 2) as u8);
    for word in words {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
}

/// Command reading holding registers.
#[derive(Debug, Clone)]
pub struct ReadRegistersCommand {
    transaction_id: u16,
    unit_id: u8,
    address: u16,
    count: u16,
}

impl ReadRegistersCommand {
    /// Creates a new read command.
    ///
    /// # Errors
    ///
    /// Returns an error if count is 0 or exceeds [`MAX_READ_REGISTERS`].
    pub fn new(transaction_id: u16, unit_id: u8, address: u16, count: u16) -> Result<Self> {
        let count = check_count("count", usize::from(count), MAX_READ_REGISTERS)?;
        Ok(Self {
            transaction_id,
            unit_id,
            address,
            count,
        })
    }

    /// Returns the transaction ID.
    pub fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    /// Returns the number of registers requested.
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MBAP_HEADER_SIZE + 5);
        bytes.extend_from_slice(&MbapHeader::new(self.transaction_id, self.unit_id, 5).to_bytes());
        bytes.push(FC_READ_HOLDING_REGISTERS);
        bytes.extend_from_slice(&self.address.to_be_bytes());
        bytes.extend_from_slice(&self.count.to_be_bytes());
        bytes
    }
}

/// Command writing multiple holding registers.
#[derive(Debug, Clone)]
pub struct WriteRegistersCommand {
    transaction_id: u16,
    unit_id: u8,
    address: u16,
    data: Vec<u16>,
}

impl WriteRegistersCommand {
    /// Creates a new write command.
    ///
    /// # Errors
    ///
    /// Returns an error if data is empty or exceeds [`MAX_WRITE_REGISTERS`].
    ///
    /// # Example
    ///
    /// ```
    /// use festo_fhpp::WriteRegistersCommand;
    ///
    /// let cmd = WriteRegistersCommand::new(2, 0, 0, &[0x0143, 0x0000]).unwrap();
    /// let bytes = cmd.to_bytes();
    /// assert_eq!(&bytes[7..], &[0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x01, 0x43, 0x00, 0x00]);
    /// ```
    pub fn new(transaction_id: u16, unit_id: u8, address: u16, data: &[u16]) -> Result<Self> {
        check_count("data", data.len(), MAX_WRITE_REGISTERS)?;
        Ok(Self {
            transaction_id,
            unit_id,
            address,
            data: data.to_vec(),
        })
    }

    /// Returns the transaction ID.
    pub fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    /// Returns the number of registers written.
    pub fn count(&self) -> u16 {
        self.data.len() as u16
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let pdu_len = 6 + self.data.len() * 2;
        let mut bytes = Vec::with_capacity(MBAP_HEADER_SIZE + pdu_len);
        bytes.extend_from_slice(
            &MbapHeader::new(self.transaction_id, self.unit_id, pdu_len).to_bytes(),
        );
        bytes.push(FC_WRITE_MULTIPLE_REGISTERS);
        bytes.extend_from_slice(&self.address.to_be_bytes());
        bytes.extend_from_slice(&self.count().to_be_bytes());
        push_words(&mut bytes, &self.data);
        bytes
    }
}

/// Command writing registers and reading registers in one transaction.
///
/// The server performs the write before the read.
#[derive(Debug, Clone)]
pub struct ReadWriteRegistersCommand {
    transaction_id: u16,
    unit_id: u8,
    read_address: u16,
    read_count: u16,
    write_address: u16,
    data: Vec<u16>,
}

impl ReadWriteRegistersCommand {
    /// Creates a new read/write command.
    ///
    /// # Errors
    ///
    /// Returns an error if either count is 0 or exceeds its maximum.
    pub fn new(
        transaction_id: u16,
        unit_id: u8,
        write_address: u16,
        data: &[u16],
        read_address: u16,
        read_count: u16,
    ) -> Result<Self> {
        check_count("data", data.len(), MAX_READ_WRITE_REGISTERS)?;
        let read_count = check_count("read_count", usize::from(read_count), MAX_READ_REGISTERS)?;
        Ok(Self {
            transaction_id,
            unit_id,
            read_address,
            read_count,
            write_address,
            data: data.to_vec(),
        })
    }

    /// Returns the transaction ID.
    pub fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    /// Returns the number of registers requested.
    pub fn read_count(&self) -> u16 {
        self.read_count
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let pdu_len = 10 + self.data.len() * 2;
        let mut bytes = Vec::with_capacity(MBAP_HEADER_SIZE + pdu_len);
        bytes.extend_from_slice(
            &MbapHeader::new(self.transaction_id, self.unit_id, pdu_len).to_bytes(),
        );
        bytes.push(FC_READ_WRITE_MULTIPLE_REGISTERS);
        bytes.extend_from_slice(&self.read_address.to_be_bytes());
        bytes.extend_from_slice(&self.read_count.to_be_bytes());
        bytes.extend_from_slice(&self.write_address.to_be_bytes());
        bytes.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        push_words(&mut bytes, &self.data);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_command_limits() {
        assert!(ReadRegistersCommand::new(1, 0, 0, 0).is_err());
        assert!(ReadRegistersCommand::new(1, 0, 0, MAX_READ_REGISTERS).is_ok());
        assert!(ReadRegistersCommand::new(1, 0, 0, MAX_READ_REGISTERS + 1).is_err());
    }

    #[test]
    fn test_write_command_bytes() {
        let cmd = WriteRegistersCommand::new(0x0A0B, 1, 0, &[0x0143, 0xFF00, 0x0000, 0x3A98]).unwrap();
        assert_eq!(
            hex::encode(cmd.to_bytes()),
            "0a0b0000000f011000000004080143ff0000003a98"
        );
    }

    #[test]
    fn test_write_command_empty() {
        let result = WriteRegistersCommand::new(1, 0, 0, &[]);
        assert!(matches!(result, Err(FhppError::InvalidParameter { .. })));
    }

    #[test]
    fn test_read_write_command_bytes() {
        let cmd = ReadWriteRegistersCommand::new(7, 0, 0, &[0x0143, 0x0000, 0x0000, 0x0001], 0, 4)
            .unwrap();
        assert_eq!(
            hex::encode(cmd.to_bytes()),
            "00070000001300170000000400000004080143000000000001"
        );
        assert_eq!(cmd.read_count(), 4);
    }

    #[test]
    fn test_read_write_command_limits() {
        let too_many = vec![0u16; usize::from(MAX_READ_WRITE_REGISTERS) + 1];
        assert!(ReadWriteRegistersCommand::new(1, 0, 0, &too_many, 0, 4).is_err());
        assert!(ReadWriteRegistersCommand::new(1, 0, 0, &[0], 0, 0).is_err());
    }
}

//! Modbus TCP response parsing and validation.
//!
//! # Response Structure
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | Header | 7 bytes | MBAP header, transaction ID echoed |
//! | Function | 1 byte | Request function code, or `0x80 | code` on exception |
//! | Data | Variable | Byte count + registers, write echo, or exception code |
//!
//! # Example
//!
//! ```
//! use festo_fhpp::ModbusResponse;
//!
//! let bytes = [
//!     0x00, 0x01, 0x00, 0x00, 0x00, 0x0B, 0x00, // header
//!     0x03, 0x08, // function, byte count
//!     0x01, 0x43, 0x00, 0x00, 0x00, 0x00, 0x3A, 0x98, // registers
//! ];
//!
//! let response = ModbusResponse::from_bytes(&bytes).unwrap();
//! assert!(!response.is_exception());
//! assert_eq!(response.to_registers(4).unwrap(), vec![0x0143, 0x0000, 0x0000, 0x3A98]);
//! ```

use crate::error::{FhppError, Result};
use crate::header::{MbapHeader, MBAP_HEADER_SIZE};

/// Bit set in the function code of an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Parsed Modbus TCP response.
#[derive(Debug, Clone)]
pub struct ModbusResponse {
    /// Response header.
    pub header: MbapHeader,
    /// Function code as received.
    pub function: u8,
    /// PDU bytes following the function code.
    pub data: Vec<u8>,
}

impl ModbusResponse {
    /// Parses a response from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or the PDU length does not
    /// match the header length field.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = MbapHeader::from_bytes(data)?;
        let pdu = &data[MBAP_HEADER_SIZE..];

        if pdu.len() != header.pdu_len() {
            return Err(FhppError::invalid_response(format!(
                "PDU length mismatch: header says {} bytes, got {}",
                header.pdu_len(),
                pdu.len()
            )));
        }

        Ok(Self {
            header,
            function: pdu[0],
            data: pdu[1..].to_vec(),
        })
    }

    /// Returns whether the response is a Modbus exception.
    pub fn is_exception(&self) -> bool {
        self.function & EXCEPTION_FLAG != 0
    }

    /// Validates the response against the request it answers.
    ///
    /// # Errors
    ///
    /// - `FhppError::TransactionMismatch` if the transaction ID differs
    /// - `FhppError::ModbusException` if the server rejected the request
    /// - `FhppError::InvalidResponse` if the function code differs
    ///
    /// # Example
    ///
    /// ```
    /// use festo_fhpp::{FhppError, ModbusResponse};
    ///
    /// let bytes = [0x00, 0x05, 0x00, 0x00, 0x00, 0x03, 0x00, 0x97, 0x02];
    /// let response = ModbusResponse::from_bytes(&bytes).unwrap();
    /// let err = response.check(0x0005, 0x17).unwrap_err();
    /// assert!(matches!(err, FhppError::ModbusException { function: 0x17, code: 0x02 }));
    /// ```
    pub fn check(&self, transaction_id: u16, function: u8) -> Result<()> {
        if self.header.transaction_id != transaction_id {
            return Err(FhppError::transaction_mismatch(
                transaction_id,
                self.header.transaction_id,
            ));
        }
        if self.is_exception() {
            let code = self.data.first().copied().unwrap_or(0);
            return Err(FhppError::modbus_exception(
                self.function & !EXCEPTION_FLAG,
                code,
            ));
        }
        if self.function != function {
            return Err(FhppError::invalid_response(format!(
                "function code mismatch: expected 0x{:02X}, got 0x{:02X}",
                function, self.function
            )));
        }
        Ok(())
    }

    /// Converts a read response to register words (big-endian).
    ///
    /// # Errors
    ///
    /// Returns an error if the byte count does not match `count` registers.
    pub fn to_registers(&self, count: u16) -> Result<Vec<u16>> {
        let expected = usize::from(count) * 2;
        let byte_count = self
            .data
            .first()
            .copied()
            .ok_or_else(|| FhppError::invalid_response("missing byte count"))?;

        if usize::from(byte_count) != expected || self.data.len() != expected + 1 {
            return Err(FhppError::invalid_response(format!(
                "expected {} register bytes, got byte count {} with {} bytes",
                expected,
                byte_count,
                self.data.len().saturating_sub(1)
            )));
        }

        Ok(self.data[1..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect())
    }

    /// Validates the address/quantity echo of a write response.
    ///
    /// # Errors
    ///
    /// Returns an error if the echo is missing or differs from the request.
    pub fn check_write_echo(&self, address: u16, count: u16) -> Result<()> {
        if self.data.len() != 4 {
            return Err(FhppError::invalid_response(format!(
                "write echo must be 4 bytes, got {}",
                self.data.len()
            )));
        }
        let echo_address = u16::from_be_bytes([self.data[0], self.data[1]]);
        let echo_count = u16::from_be_bytes([self.data[2], self.data[3]]);
        if echo_address != address || echo_count != count {
            return Err(FhppError::invalid_response(format!(
                "write echo mismatch: expected {}x{}, got {}x{}",
                address, count, echo_address, echo_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(transaction_id: u16, function: u8, data: &[u8]) -> Vec<u8> {
        let mut bytes = MbapHeader::new(transaction_id, 0, data.len() + 1)
            .to_bytes()
            .to_vec();
        bytes.push(function);
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn test_response_from_bytes() {
        let bytes = make_response(0x0042, 0x03, &[0x02, 0x12, 0x34]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        assert_eq!(response.header.transaction_id, 0x0042);
        assert_eq!(response.function, 0x03);
        assert_eq!(response.data, vec![0x02, 0x12, 0x34]);
        assert!(response.check(0x0042, 0x03).is_ok());
    }

    #[test]
    fn test_response_length_mismatch() {
        let mut bytes = make_response(1, 0x03, &[0x02, 0x12, 0x34]);
        bytes.pop();
        assert!(ModbusResponse::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_check_transaction_mismatch() {
        let response = ModbusResponse::from_bytes(&make_response(2, 0x03, &[0x00])).unwrap();
        match response.check(1, 0x03).unwrap_err() {
            FhppError::TransactionMismatch { expected, received } => {
                assert_eq!(expected, 1);
                assert_eq!(received, 2);
            }
            other => panic!("Expected TransactionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_check_function_mismatch() {
        let response = ModbusResponse::from_bytes(&make_response(1, 0x04, &[0x00])).unwrap();
        assert!(matches!(
            response.check(1, 0x03),
            Err(FhppError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_to_registers() {
        let bytes = make_response(1, 0x17, &[0x04, 0x12, 0x34, 0xAB, 0xCD]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        assert_eq!(response.to_registers(2).unwrap(), vec![0x1234, 0xABCD]);
    }

    #[test]
    fn test_to_registers_short() {
        let bytes = make_response(1, 0x03, &[0x04, 0x12, 0x34]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        assert!(response.to_registers(2).is_err());
        assert!(response.to_registers(4).is_err());
    }

    #[test]
    fn test_write_echo() {
        let bytes = make_response(1, 0x10, &[0x00, 0x00, 0x00, 0x04]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        assert!(response.check_write_echo(0, 4).is_ok());
        assert!(response.check_write_echo(0, 2).is_err());
        assert!(response.check_write_echo(1, 4).is_err());
    }
}

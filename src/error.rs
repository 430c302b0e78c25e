//! Error types for FHPP drive control.

use std::io;
use thiserror::Error;

use crate::status::DriveStatus;

/// Result type alias for FHPP operations.
pub type Result<T> = std::result::Result<T, FhppError>;

/// Errors that can occur while driving a Festo controller.
///
/// The first group is raised by the drive engine itself. The second group is
/// passed through unchanged from the register transport.
#[derive(Debug, Error)]
pub enum FhppError {
    /// The cancellation flag was observed while an operation was polling.
    #[error("Operation cancelled")]
    Cancelled {
        /// Last status observed before the cancellation was noticed.
        status: Option<DriveStatus>,
    },

    /// The drive reported a fault or a warning during a non-recovery operation.
    #[error("Drive reports fault or warning ({status})")]
    FaultOrWarning {
        /// Status frame carrying the fault/warning bit.
        status: DriveStatus,
    },

    /// The retry budget ran out before the drive reached the target state.
    ///
    /// The drive may still be working or it may be stuck.
    #[error("{operation} did not complete after {attempts} polls ({status})")]
    LongOperation {
        /// Name of the operation phase that ran out of budget.
        operation: &'static str,
        /// Number of status observations made.
        attempts: u32,
        /// Last observed status.
        status: DriveStatus,
    },

    /// Position was requested before the drive was referenced.
    #[error("Position unknown, drive is not referenced ({status})")]
    UnknownPosition {
        /// Status frame without the referenced bit.
        status: DriveStatus,
    },

    /// The drive is controlled by another master (FCT or DIN lock).
    #[error("Drive is locked by external control ({status})")]
    Locked {
        /// Status frame carrying the lock bit.
        status: DriveStatus,
    },

    /// A register frame had the wrong number of words.
    #[error("Malformed frame: expected {expected} words, got {actual}")]
    MalformedFrame {
        /// Expected word count.
        expected: usize,
        /// Received word count.
        actual: usize,
    },

    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Communication timeout.
    #[error("Communication timeout")]
    Timeout,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport is not connected.
    #[error("Transport not connected")]
    NotConnected,

    /// Invalid response received from the drive.
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// Description of the response error.
        reason: String,
    },

    /// The drive answered with a Modbus exception.
    #[error("Modbus exception: function 0x{function:02X}, code 0x{code:02X}")]
    ModbusException {
        /// Function code of the rejected request.
        function: u8,
        /// Exception code.
        code: u8,
    },

    /// Transaction identifier mismatch between request and response.
    #[error("Transaction id mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    TransactionMismatch {
        /// Transaction id of the request.
        expected: u16,
        /// Transaction id of the response.
        received: u16,
    },

    /// The drive worker thread is gone and can no longer run operations.
    #[error("Drive worker stopped")]
    WorkerStopped,
}

impl FhppError {
    /// Creates a new `Cancelled` error.
    pub fn cancelled(status: Option<DriveStatus>) -> Self {
        Self::Cancelled { status }
    }

    /// Creates a new `LongOperation` error.
    pub fn long_operation(operation: &'static str, attempts: u32, status: DriveStatus) -> Self {
        Self::LongOperation {
            operation,
            attempts,
            status,
        }
    }

    /// Creates a new `MalformedFrame` error.
    ///
    /// # Example
    ///
    /// ```
    /// use festo_fhpp::FhppError;
    ///
    /// let err = FhppError::malformed_frame(4, 3);
    /// assert_eq!(err.to_string(), "Malformed frame: expected 4 words, got 3");
    /// ```
    pub fn malformed_frame(expected: usize, actual: usize) -> Self {
        Self::MalformedFrame { expected, actual }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    ///
    /// # Example
    ///
    /// ```
    /// use festo_fhpp::FhppError;
    ///
    /// let err = FhppError::invalid_response("response too short");
    /// ```
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new `ModbusException` error.
    pub fn modbus_exception(function: u8, code: u8) -> Self {
        Self::ModbusException { function, code }
    }

    /// Creates a new `TransactionMismatch` error.
    pub fn transaction_mismatch(expected: u16, received: u16) -> Self {
        Self::TransactionMismatch { expected, received }
    }

    /// Returns the last drive status attached to this error, if any.
    pub fn status(&self) -> Option<DriveStatus> {
        match self {
            Self::Cancelled { status } => *status,
            Self::FaultOrWarning { status }
            | Self::LongOperation { status, .. }
            | Self::UnknownPosition { status }
            | Self::Locked { status } => Some(*status),
            _ => None,
        }
    }

    /// Returns whether the error came from the transport rather than the drive.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::Io(_)
                | Self::NotConnected
                | Self::InvalidResponse { .. }
                | Self::ModbusException { .. }
                | Self::TransactionMismatch { .. }
        )
    }
}

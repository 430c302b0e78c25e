//! Register transport for FHPP communication.
//!
//! The drive engine only needs the small capability described by
//! [`RegisterTransport`]: connect, disconnect, read registers, write
//! registers, and write-then-read as one transaction. [`TcpTransport`]
//! implements it over Modbus TCP. It knows about sockets and Modbus frames,
//! nothing about FHPP.
//!
//! # Design
//!
//! - **Synchronous** - blocking request/response with configurable timeouts
//! - **Serialized** - one request at a time per transport; the stream lock is
//!   held across each request and its response
//! - **No retries** - transport errors propagate to the caller unchanged
//!
//! # Constants
//!
//! - [`DEFAULT_MODBUS_PORT`] - Default Modbus TCP port (502)
//! - [`DEFAULT_RESPONSE_TIMEOUT`] - Default response timeout (1 second)
//! - [`DEFAULT_BYTE_TIMEOUT`] - Default inter-byte timeout (0.5 seconds)
//!
//! # Example
//!
//! ```no_run
//! use festo_fhpp::{RegisterTransport, TcpTransport};
//! use std::time::Duration;
//!
//! let transport = TcpTransport::new("192.168.75.70", 502)
//!     .with_response_timeout(Duration::from_secs(2));
//! transport.connect()?;
//!
//! let status = transport.read_registers(0, 4)?;
//! println!("status words: {:?}", status);
//!
//! transport.disconnect();
//! # Ok::<(), festo_fhpp::FhppError>(())
//! ```

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::command::{
    ReadRegistersCommand, ReadWriteRegistersCommand, WriteRegistersCommand,
    FC_READ_HOLDING_REGISTERS, FC_READ_WRITE_MULTIPLE_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
};
use crate::error::{FhppError, Result};
use crate::header::{MbapHeader, MBAP_HEADER_SIZE};
use crate::response::ModbusResponse;
use crate::utils::{format_hex, format_words};

/// Default Modbus TCP port.
pub const DEFAULT_MODBUS_PORT: u16 = 502;

/// Default time to wait for the first byte of a response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time to wait for each further chunk of a response.
pub const DEFAULT_BYTE_TIMEOUT: Duration = Duration::from_millis(500);

/// Register access used by the drive engine.
///
/// Implementations must be usable from several threads: the engine polls from
/// its worker thread while [`force_cancel`](crate::Drive::force_cancel) may
/// write from another. Each call is one complete transaction, and
/// `write_and_read_registers` must not let another request run between its
/// write and its read.
pub trait RegisterTransport: Send + Sync {
    /// Opens the connection.
    fn connect(&self) -> Result<()>;

    /// Closes the connection. Idempotent, never fails.
    fn disconnect(&self);

    /// Reads `count` holding registers starting at `address`.
    fn read_registers(&self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Writes `words` to holding registers starting at `address`.
    fn write_registers(&self, address: u16, words: &[u16]) -> Result<()>;

    /// Writes `words` at `write_address`, then reads `read_count` registers
    /// at `read_address`, as one transaction.
    fn write_and_read_registers(
        &self,
        write_address: u16,
        words: &[u16],
        read_address: u16,
        read_count: u16,
    ) -> Result<Vec<u16>>;
}

/// Modbus TCP transport.
pub struct TcpTransport {
    host: String,
    port: u16,
    unit_id: u8,
    response_timeout: Duration,
    byte_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
    transaction_counter: AtomicU16,
}

impl TcpTransport {
    /// Creates a disconnected transport for `host:port` with default timeouts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id: 0,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            byte_timeout: DEFAULT_BYTE_TIMEOUT,
            stream: Mutex::new(None),
            transaction_counter: AtomicU16::new(0),
        }
    }

    /// Sets the Modbus unit ID (default 0).
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Sets the response timeout (default 1 second).
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the inter-byte timeout (default 0.5 seconds).
    pub fn with_byte_timeout(mut self, timeout: Duration) -> Self {
        self.byte_timeout = timeout;
        self
    }

    /// Returns the configured endpoint as `host:port`.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.stream.lock().is_some()
    }

    fn next_transaction_id(&self) -> u16 {
        self.transaction_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends a request and receives the matching response.
    ///
    /// A failed exchange drops the connection: the stream may hold half a
    /// frame and cannot be reused.
    fn transact(&self, request: &[u8], transaction_id: u16, function: u8) -> Result<ModbusResponse> {
        let mut guard = self.stream.lock();
        let stream = guard.as_mut().ok_or(FhppError::NotConnected)?;

        let result = self
            .exchange(stream, request)
            .and_then(|bytes| ModbusResponse::from_bytes(&bytes))
            .and_then(|response| response.check(transaction_id, function).map(|_| response));

        if let Err(e) = &result {
            if e.is_transport() && !matches!(e, FhppError::ModbusException { .. }) {
                debug!(endpoint = %self.endpoint(), error = %e, "dropping connection");
                if let Some(stream) = guard.take() {
                    let _ = stream.shutdown(Shutdown::Both);
                }
            }
        }
        result
    }

    fn exchange(&self, stream: &mut TcpStream, request: &[u8]) -> Result<Vec<u8>> {
        stream.set_write_timeout(Some(self.response_timeout))?;
        stream.write_all(request).map_err(map_io)?;

        let mut header = [0u8; MBAP_HEADER_SIZE];
        stream.set_read_timeout(Some(self.response_timeout))?;
        stream.read_exact(&mut header[..1]).map_err(map_io)?;
        stream.set_read_timeout(Some(self.byte_timeout))?;
        stream.read_exact(&mut header[1..]).map_err(map_io)?;

        let parsed = MbapHeader::from_bytes(&header)?;
        let mut frame = vec![0u8; MBAP_HEADER_SIZE + parsed.pdu_len()];
        frame[..MBAP_HEADER_SIZE].copy_from_slice(&header);
        stream
            .read_exact(&mut frame[MBAP_HEADER_SIZE..])
            .map_err(map_io)?;

        trace!(request = ?request, response = ?frame, "modbus exchange");
        Ok(frame)
    }
}

fn map_io(e: io::Error) -> FhppError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => FhppError::Timeout,
        _ => FhppError::Io(e),
    }
}

impl RegisterTransport for TcpTransport {
    fn connect(&self) -> Result<()> {
        let mut guard = self.stream.lock();
        if guard.is_some() {
            return Ok(());
        }

        let mut last_error = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.response_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(%addr, "connected");
                    *guard = Some(stream);
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.map(map_io).unwrap_or_else(|| {
            FhppError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {}", self.endpoint()),
            ))
        }))
    }

    fn disconnect(&self) {
        if let Some(stream) = self.stream.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!(endpoint = %self.endpoint(), "disconnected");
        }
    }

    fn read_registers(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        let tid = self.next_transaction_id();
        let cmd = ReadRegistersCommand::new(tid, self.unit_id, address, count)?;

        let response = self.transact(&cmd.to_bytes(), tid, FC_READ_HOLDING_REGISTERS)?;
        let words = response.to_registers(count)?;
        debug!(tid, address = %format_hex(address), words = %format_words(&words), "read");
        Ok(words)
    }

    fn write_registers(&self, address: u16, words: &[u16]) -> Result<()> {
        let tid = self.next_transaction_id();
        let cmd = WriteRegistersCommand::new(tid, self.unit_id, address, words)?;

        debug!(tid, address = %format_hex(address), words = %format_words(words), "write");
        let response = self.transact(&cmd.to_bytes(), tid, FC_WRITE_MULTIPLE_REGISTERS)?;
        response.check_write_echo(address, cmd.count())
    }

    fn write_and_read_registers(
        &self,
        write_address: u16,
        words: &[u16],
        read_address: u16,
        read_count: u16,
    ) -> Result<Vec<u16>> {
        let tid = self.next_transaction_id();
        let cmd = ReadWriteRegistersCommand::new(
            tid,
            self.unit_id,
            write_address,
            words,
            read_address,
            read_count,
        )?;

        let response = self.transact(&cmd.to_bytes(), tid, FC_READ_WRITE_MULTIPLE_REGISTERS)?;
        let read = response.to_registers(read_count)?;
        debug!(
            tid,
            wrote = %format_words(words),
            read = %format_words(&read),
            "write/read"
        );
        Ok(read)
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("endpoint", &self.endpoint())
            .field("unit_id", &self.unit_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

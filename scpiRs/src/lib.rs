//! ScpiRs: Talk SCPI to your (cheap) bench instruments over flaky serial links
//!
//! Many low-cost laboratory instruments, e.g., bench power supplies, speak a line-oriented text
//! dialect that is closely related to SCPI. They are usually connected through a USB-to-serial
//! bridge that echoes whatever the host sends before the instrument replies, and they need some
//! settle time after the bus went idle before they reliably accept the next command. ScpiRs
//! provides the protocol engine that deals with these quirks:
//!
//! - [`encode`] turns a command mnemonic and its arguments into one outgoing line, e.g.,
//!   `APPL 5.0,1.2\n`.
//! - [`parse`] tokenizes a received line and infers the type of every token.
//! - [`Transactor`] runs one request/response exchange: it sends the line, suppresses the echo of
//!   it, waits for the reply for a bounded time, and restores the session timeout afterwards.
//!
//! The transactor talks to the instrument through the [`Transport`] trait. Implementations are
//! provided for serial ports ([`SerialSession`], requires the `serial` feature), TCP/IP
//! ([`TcpSession`]), and a scripted [`LoopbackSession`] that allows you to test your instrument
//! driver without any hardware attached.
//!
//! Calibration polynomials that post-process measured values are handled by [`Calibrations`].
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "serial")]
//! # {
//! use std::time::Duration;
//!
//! use scpirs::{SerialSession, Transactor};
//!
//! let session = SerialSession::simple("/dev/ttyUSB0", 9600).unwrap();
//! let mut scpi = Transactor::new(session);
//!
//! scpi.write_line(&[":VOLT".into(), 5.0.into()]).unwrap();
//! let resp = scpi.execute(&["APPL?".into()], Duration::from_millis(2500)).unwrap();
//! println!("Applied: {resp:?}");
//! # }
//! ```
//!
//! # License
//!
//! Licensed under either of
//!
//! - Apache License, Version 2.0 ([LICENSE-APACHE](http://www.apache.org/licenses/LICENSE-2.0))
//! - MIT license ([LICENSE-MIT](http://opensource.org/licenses/MIT))
//!
//! at your option.

#![warn(missing_docs)]

mod calibration;
mod common;
mod encode;
mod loopback;
mod parse;
#[cfg(feature = "serial")]
mod serial;
mod tcp_ip;
mod transactor;
mod value;

pub use calibration::Calibrations;
pub use encode::encode;
pub use loopback::LoopbackSession;
pub use parse::parse;
#[cfg(feature = "serial")]
pub use serial::SerialSession;
pub use tcp_ip::TcpSession;
pub use transactor::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_RAW_LINES_TIMEOUT, DEFAULT_RESET_DELAY, DEFAULT_SETTLE_DELAY,
    Transactor,
};
pub use value::{Response, Value};

use std::{
    io::{ErrorKind, Read},
    time::{Duration, Instant},
};

use thiserror::Error;

/// The line terminator that ends every outgoing and incoming line.
pub const TERMINATOR: u8 = b'\n';

/// The error enum for the protocol engine and all instrument drivers built on top of it.
///
/// Encoding and transport faults are returned immediately to the caller. A query that timed out
/// is not an error for the [`Transactor`], it simply returns `None`. Drivers that require a value
/// turn this into [`ScpiError::NoResponse`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScpiError {
    /// A line was requested to be encoded without any arguments, i.e., without a command.
    #[error("Cannot encode an empty command: at least a command mnemonic is required.")]
    EmptyCommand,
    /// A float value is out of the specified range. The error contains the value that was
    /// sent, the minimum value that is allowed, and the maximum value that is allowed.
    #[error("Float value {value} is out of range. Allowed range is [{min}, {max}]")]
    FloatValueOutOfRange {
        /// The value that is out of range.
        value: f64,
        /// The minimum value that is allowed.
        min: f64,
        /// The maximum value that is allowed.
        max: f64,
    },
    /// An integer value is out of the specified range.
    #[error("Integer value {value} is out of range. Allowed range is [{min}, {max}]")]
    IntValueOutOfRange {
        /// The value that is out of range.
        value: i64,
        /// The minimum value that is allowed.
        min: i64,
        /// The maximum value that is allowed.
        max: i64,
    },
    /// Error when an invalid argument is passed to a function. The message is intended for the
    /// user.
    #[error("{0}")]
    InvalidArgument(String),
    /// Error when reading from/writing to an interface. See [`std::io::Error`] for more details.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Reading or writing the calibration file failed to (de)serialize.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// The instrument did not answer a query that requires a value.
    #[error("No response received for query: {query}")]
    NoResponse {
        /// The query that was sent.
        query: String,
    },
    /// A polynomial with no coefficients was requested or added.
    #[error("Polynomial '{0}' has no coefficients.")]
    EmptyPolynomial(String),
    /// The response could not be interpreted by the driver. Contains the response received.
    #[error("Response from instrument could not be parsed. Response was: {0}")]
    ResponseParseError(String),
    #[cfg(feature = "serial")]
    /// Serial port errors can occur when opening a serial interface. See the [`serialport::Error`]
    /// documentation for more information.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
    /// The underlying link is closed or was torn down.
    #[error("Transport is not available: {0}")]
    TransportUnavailable(String),
    /// The requested calibration polynomial does not exist.
    #[error("Polynomial '{0}' not found.")]
    UnknownPolynomial(String),
}

/// The `Transport` trait defines the duplex byte stream the [`Transactor`] talks through.
///
/// Implementors only have to provide the raw operations. The timeout is a single mutable property
/// and every timed operation must honor its value at the time of the call.
pub trait Transport {
    /// Write all bytes to the output of the transport.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError>;

    /// Block until the locally queued output is handed to the physical link.
    fn flush(&mut self) -> Result<(), ScpiError>;

    /// Number of bytes that are still queued for output.
    ///
    /// Transports that cannot tell report zero, which is the default.
    fn out_waiting(&mut self) -> Result<usize, ScpiError> {
        Ok(0)
    }

    /// Read and return whatever already arrived on the input without blocking.
    fn read_all_buffered(&mut self) -> Result<Vec<u8>, ScpiError>;

    /// Read one line, including its terminator.
    ///
    /// Blocks at most for the current timeout. If the timeout elapses first, whatever was received
    /// so far is returned, which might be nothing at all.
    fn read_line(&mut self) -> Result<Vec<u8>, ScpiError>;

    /// Read lines until one read returns without a terminated line.
    ///
    /// The last partial line is kept if it contains any bytes.
    fn read_lines_until_timeout(&mut self) -> Result<Vec<Vec<u8>>, ScpiError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let complete = line.last() == Some(&TERMINATOR);
            if !line.is_empty() {
                lines.push(line);
            }
            if !complete {
                return Ok(lines);
            }
        }
    }

    /// Get the currently active read timeout.
    fn get_timeout(&self) -> Duration;

    /// Set the read timeout for all following operations.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError>;
}

/// Escape bytes for log output.
pub(crate) fn escaped(data: &[u8]) -> String {
    data.escape_ascii().to_string()
}

/// Read one line from a blocking reader byte by byte.
///
/// Stops at the terminator, when the reader times out or reaches its end, or when `timeout` has
/// elapsed. At least one read is attempted.
pub(crate) fn read_line_from<R: Read + ?Sized>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Vec<u8>, ScpiError> {
    let mut line = Vec::new();
    let mut single_buf = [0u8];

    let tic = Instant::now();
    loop {
        match reader.read(&mut single_buf) {
            Ok(0) => break,
            Ok(_) => {
                line.push(single_buf[0]);
                if single_buf[0] == TERMINATOR {
                    break;
                }
            }
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                break;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
        if tic.elapsed() >= timeout {
            break;
        }
    }

    log::trace!("Received '{}'", escaped(&line));
    Ok(line)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    #[test]
    fn test_read_line_from() {
        let mut data = VecDeque::from(b"5.0,1.2\nON\nrest".to_vec());
        let timeout = Duration::from_secs(1);
        assert_eq!(read_line_from(&mut data, timeout).unwrap(), b"5.0,1.2\n");
        assert_eq!(read_line_from(&mut data, timeout).unwrap(), b"ON\n");
        assert_eq!(read_line_from(&mut data, timeout).unwrap(), b"rest");
        assert!(read_line_from(&mut data, timeout).unwrap().is_empty());
    }
}

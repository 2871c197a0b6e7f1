//! This module provides the transport session for an instrument connected via a serial port.
//!
//! It includes a blocking implementation of the [`Transport`] trait using the `serialport` crate.

use std::{
    io::{Read, Write},
    time::Duration,
};

use serialport::{SerialPort, SerialPortBuilder};

use crate::{ScpiError, Transport, escaped, read_line_from};

/// A blocking serial port session using the `serialport` crate.
///
/// The session owns the port for its whole life. After [`SerialSession::close`] was called, every
/// operation fails with [`ScpiError::TransportUnavailable`].
#[derive(Debug)]
pub struct SerialSession {
    port: Option<Box<dyn SerialPort>>,
}

impl SerialSession {
    /// Try to open a serial session with a simple configuration.
    ///
    /// This only requires the port and the baud rate. The read timeout is set to 1 second, all
    /// other settings are the `serialport` defaults (8N1, no flow control).
    ///
    /// # Arguments
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud_rate` - The transfer rate, e.g., `9600`.
    pub fn simple(port: &str, baud_rate: u32) -> Result<Self, ScpiError> {
        let spb = serialport::new(port, baud_rate).timeout(Duration::from_secs(1));
        Self::full(spb)
    }

    /// Try to open a serial session from a fully configured `SerialPortBuilder`.
    ///
    /// See [`serialport::SerialPortBuilder`] and the [`serialport::new`] function for more
    /// details.
    pub fn full(spb: SerialPortBuilder) -> Result<Self, ScpiError> {
        let port = spb.open()?;
        log::debug!(
            "Opened serial port {:?} at {} baud",
            port.name(),
            port.baud_rate()?
        );
        Ok(Self { port: Some(port) })
    }

    /// Close the port. The session cannot be used anymore afterwards.
    pub fn close(&mut self) {
        self.port = None;
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, ScpiError> {
        self.port
            .as_mut()
            .ok_or_else(|| ScpiError::TransportUnavailable("serial port is closed".to_string()))
    }
}

impl Transport for SerialSession {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError> {
        self.port()?.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ScpiError> {
        self.port()?.flush()?;
        Ok(())
    }

    fn out_waiting(&mut self) -> Result<usize, ScpiError> {
        Ok(self.port()?.bytes_to_write()? as usize)
    }

    fn read_all_buffered(&mut self) -> Result<Vec<u8>, ScpiError> {
        let port = self.port()?;
        let mut buf = vec![0u8; port.bytes_to_read()? as usize];
        port.read_exact(&mut buf)?;
        if !buf.is_empty() {
            log::trace!("Drained '{}'", escaped(&buf));
        }
        Ok(buf)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ScpiError> {
        let port = self.port()?;
        let timeout = port.timeout();
        read_line_from(port, timeout)
    }

    fn get_timeout(&self) -> Duration {
        match &self.port {
            Some(port) => port.timeout(),
            None => Duration::ZERO,
        }
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError> {
        self.port()?.set_timeout(timeout)?;
        Ok(())
    }
}

//! This module provides the transport session for an instrument reachable via TCP/IP, e.g.,
//! through an ethernet to serial bridge.
//!
//! It includes a blocking implementation of the [`Transport`] trait using the
//! [`std::net::TcpStream`] struct.

use std::{
    io::{ErrorKind, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::{ScpiError, Transport, escaped, read_line_from};

/// A blocking TCP/IP session using the [`std::net::TcpStream`] struct.
#[derive(Debug)]
pub struct TcpSession {
    stream: Option<TcpStream>,
    timeout: Duration,
}

impl TcpSession {
    /// Try to connect a new [`TcpSession`].
    ///
    /// A `TcpStream` can block forever if no read timeout is set, which is not wanted for
    /// instrument communications. The timeout is therefore set to three seconds. This can of
    /// course be adjusted with [`Transport::set_timeout`].
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address.
    pub fn try_new<A: ToSocketAddrs>(sock_addr: A) -> Result<Self, ScpiError> {
        let stream = TcpStream::connect(sock_addr)?;
        let timeout = Duration::from_secs(3);
        stream.set_write_timeout(Some(timeout))?;
        stream.set_read_timeout(Some(timeout))?;
        log::debug!("Connected to {}", stream.peer_addr()?);
        Ok(Self {
            stream: Some(stream),
            timeout,
        })
    }

    /// Shut down the connection. The session cannot be used anymore afterwards.
    pub fn close(&mut self) {
        self.stream = None;
    }

    fn stream(&mut self) -> Result<&mut TcpStream, ScpiError> {
        self.stream
            .as_mut()
            .ok_or_else(|| ScpiError::TransportUnavailable("TCP/IP stream is closed".to_string()))
    }
}

impl Transport for TcpSession {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError> {
        self.stream()?.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ScpiError> {
        self.stream()?.flush()?;
        Ok(())
    }

    fn read_all_buffered(&mut self) -> Result<Vec<u8>, ScpiError> {
        let stream = self.stream()?;
        stream.set_nonblocking(true)?;

        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        let result = loop {
            match stream.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => break Err(err),
            }
        };

        stream.set_nonblocking(false)?;
        result?;
        if !data.is_empty() {
            log::trace!("Drained '{}'", escaped(&data));
        }
        Ok(data)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ScpiError> {
        let timeout = self.timeout;
        read_line_from(self.stream()?, timeout)
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the read timeout of the socket.
    ///
    /// Sockets do not accept a zero timeout, one millisecond is used instead.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError> {
        let socket_timeout = timeout.max(Duration::from_millis(1));
        self.stream()?.set_read_timeout(Some(socket_timeout))?;
        self.timeout = timeout;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{io::BufRead, io::BufReader, net::TcpListener, thread};

    use super::*;

    #[test]
    fn test_tcp_session_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, "*IDN?\n");
            let mut stream = stream;
            stream.write_all(b"MODEL123\n").unwrap();
        });

        let mut session = TcpSession::try_new(addr).unwrap();
        session.write_raw(b"*IDN?\n").unwrap();
        session.flush().unwrap();
        assert_eq!(session.read_line().unwrap(), b"MODEL123\n");
        server.join().unwrap();

        session.close();
        assert!(matches!(
            session.read_line(),
            Err(ScpiError::TransportUnavailable(_))
        ));
    }
}

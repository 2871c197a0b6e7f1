//! The loopback module provides an instrument simulator for testing purposes.
//!
//! A [`LoopbackSession`] plays back a scripted transcript. It knows which lines the host is
//! expected to send and which bytes the instrument answers with. It can furthermore behave like a
//! cheap USB-to-serial bridge that echoes every line it receives, hold stale bytes from a
//! previous exchange, or pretend that output is still pending.

use std::{collections::VecDeque, time::Duration};

use crate::{ScpiError, TERMINATOR, Transport, escaped};

/// A self-incrementing index structure that by default starts at 0 and increments whenever `next`
/// is called.
#[derive(Debug, Default)]
struct IncrIndex {
    index: usize,
}

impl IncrIndex {
    fn next(&mut self) -> usize {
        let current = self.index;
        self.index += 1;
        current
    }
}

/// A scripted transport that allows you to simply write tests for your instrument driver.
///
/// Everything the host writes is compared with the next expected entry of `from_host`, any
/// mismatch panics. The entries of `from_inst` are made available one after the other whenever
/// the host reads and nothing else is waiting. Once they are used up, a read behaves like a read
/// that timed out and returns nothing.
///
/// When the session is dropped, it panics if not all entries of the transcript were used.
///
/// # Example
///
/// ```
/// use scpirs::{LoopbackSession, Transport};
///
/// let mut session = LoopbackSession::new(vec!["*IDN?\n"], vec!["MODEL123\n"]);
///
/// session.write_raw(b"*IDN?\n").unwrap();
/// assert_eq!(session.read_line().unwrap(), b"MODEL123\n");
/// assert!(session.read_line().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct LoopbackSession {
    from_host: Vec<Vec<u8>>,
    from_inst: Vec<Vec<u8>>,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    rx: VecDeque<u8>,
    echo: bool,
    out_waiting: usize,
    timeout: Duration,
    read_timeouts: Vec<Duration>,
    closed: bool,
}

impl LoopbackSession {
    /// Create a new loopback session from the expected lines to and from the instrument.
    ///
    /// All entries must contain their terminators. An instrument entry without terminator
    /// simulates a line that was cut off by a timeout.
    ///
    /// # Arguments:
    /// * `from_host` - Lines from host to instrument.
    /// * `from_inst` - Lines from instrument to host.
    pub fn new(from_host: Vec<&str>, from_inst: Vec<&str>) -> Self {
        Self::from_bytes(
            from_host.into_iter().map(|s| s.as_bytes().to_vec()).collect(),
            from_inst.into_iter().map(|s| s.as_bytes().to_vec()).collect(),
        )
    }

    /// Create a new loopback session from raw bytes to and from the instrument.
    pub fn from_bytes(from_host: Vec<Vec<u8>>, from_inst: Vec<Vec<u8>>) -> Self {
        LoopbackSession {
            from_host,
            from_inst,
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            rx: VecDeque::new(),
            echo: false,
            out_waiting: 0,
            timeout: Duration::from_secs(1),
            read_timeouts: Vec::new(),
            closed: false,
        }
    }

    /// Echo every written line back to the host before the instrument replies.
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Put bytes into the receive buffer that are left over from an earlier exchange.
    pub fn with_stale(mut self, stale: &[u8]) -> Self {
        self.rx.extend(stale);
        self
    }

    /// Pretend that `count` bytes of output are pending.
    ///
    /// Every poll of [`Transport::out_waiting`] reports the current count and then decreases it
    /// by one.
    pub fn with_out_waiting(mut self, count: usize) -> Self {
        self.out_waiting = count;
        self
    }

    /// The timeouts that were active during every call to [`Transport::read_line`].
    pub fn read_timeouts(&self) -> &[Duration] {
        &self.read_timeouts
    }

    /// Close the session. All further reads and writes fail, the timeout stays accessible.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// This command panics if not all entries of the transcript have been used.
    ///
    /// It is automatically called when the [`LoopbackSession`] is dropped, but you can also call
    /// it manually to ensure that all commands have been used.
    pub fn finalize(&mut self) {
        let from_host_leftover = self.from_host.get(self.from_host_index.index);
        let from_inst_leftover = self.from_inst.get(self.from_inst_index.index);
        if let Some(fil) = from_host_leftover {
            panic!(
                "Leftover expected commands found from host to instrument: '{}'",
                escaped(fil)
            );
        }
        if let Some(fil) = from_inst_leftover {
            panic!(
                "Leftover expected commands found from instrument to host: '{}'",
                escaped(fil)
            );
        }
    }

    fn check_open(&self) -> Result<(), ScpiError> {
        if self.closed {
            Err(ScpiError::TransportUnavailable(
                "loopback session is closed".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Get the next command from host to instrument, or panic.
    fn get_next_from_host(&mut self) -> &[u8] {
        self.from_host
            .get(self.from_host_index.next())
            .expect("No more commands were expected from host to instrument.")
    }

    /// Move the next instrument entry into the receive buffer and return its length.
    fn receive_next_from_inst(&mut self) -> Option<usize> {
        let next = self.from_inst.get(self.from_inst_index.next())?;
        self.rx.extend(next);
        Some(next.len())
    }
}

impl Transport for LoopbackSession {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError> {
        self.check_open()?;
        let exp = self.get_next_from_host().to_vec();
        assert_eq!(
            exp,
            data,
            "Expected '{}', got '{}'",
            escaped(&exp),
            escaped(data)
        );
        if self.echo {
            self.rx.extend(data);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ScpiError> {
        self.check_open()
    }

    fn out_waiting(&mut self) -> Result<usize, ScpiError> {
        self.check_open()?;
        let current = self.out_waiting;
        self.out_waiting = self.out_waiting.saturating_sub(1);
        Ok(current)
    }

    fn read_all_buffered(&mut self) -> Result<Vec<u8>, ScpiError> {
        self.check_open()?;
        Ok(self.rx.drain(..).collect())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ScpiError> {
        self.check_open()?;
        self.read_timeouts.push(self.timeout);

        let mut line = Vec::new();
        loop {
            match self.rx.pop_front() {
                Some(byte) => {
                    line.push(byte);
                    if byte == TERMINATOR {
                        return Ok(line);
                    }
                }
                None => {
                    // A partial entry counts as a line cut off by the timeout, an empty one as a
                    // read that timed out without receiving anything.
                    if !line.is_empty() {
                        return Ok(line);
                    }
                    match self.receive_next_from_inst() {
                        Some(0) | None => return Ok(line),
                        Some(_) => {}
                    }
                }
            }
        }
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError> {
        self.timeout = timeout;
        Ok(())
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}

// Tests of internal functionality
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incrementing_index() {
        let mut idx = IncrIndex::default();
        assert_eq!(0, idx.next());
        assert_eq!(1, idx.next());
        assert_eq!(2, idx.next());
    }
}

//! The command transactor runs one request/response exchange with an instrument.
//!
//! An exchange goes through the following states:
//!
//! 1. **Idle → Sending**: the per-call timeout is installed, pending output is flushed and
//!    drained, the settle delay passes, and stale input is discarded.
//! 2. **Sending**: the encoded line is written and remembered as the echo marker.
//! 3. **AwaitingResponse**: lines are read until one is accepted. Lines that contain the echo
//!    marker are discarded.
//! 4. **Complete / TimedOut → Idle**: the echo marker is cleared and the previous timeout is
//!    restored, no matter how the exchange ended.

use std::{
    ops::{Deref, DerefMut},
    thread,
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use crate::{Response, ScpiError, Transport, Value, encode, escaped, parse};

/// Timeout used by [`Transactor::command`].
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(2500);

/// Timeout used by [`Transactor::raw_lines`].
pub const DEFAULT_RAW_LINES_TIMEOUT: Duration = Duration::from_secs(5);

/// Time to wait after the bus went idle before a new command is sent.
///
/// Some instruments do not reliably accept a command that follows the previous exchange too
/// closely. The value is empirical.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Time the instrument needs to come back after a `*RST`.
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(7);

/// A transport with a temporarily installed timeout.
///
/// The previous timeout is restored when the guard is dropped, which also covers early returns
/// and unwinding.
struct TimeoutGuard<'a, T: Transport> {
    transport: &'a mut T,
    saved: Duration,
}

impl<'a, T: Transport> TimeoutGuard<'a, T> {
    fn install(transport: &'a mut T, timeout: Duration) -> Result<Self, ScpiError> {
        let saved = transport.get_timeout();
        transport.set_timeout(timeout)?;
        Ok(Self { transport, saved })
    }
}

impl<T: Transport> Deref for TimeoutGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: Transport> DerefMut for TimeoutGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: Transport> Drop for TimeoutGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.transport.set_timeout(self.saved) {
            warn!("Could not restore timeout of {:?}: {err}", self.saved);
        }
    }
}

/// Runs request/response exchanges with an instrument over a [`Transport`].
///
/// Exchanges are strictly sequential: every call takes `&mut self` and completes, including the
/// restoration of the timeout, before it returns. Drivers that share a transactor between several
/// handles wrap it in an `Arc<Mutex<_>>`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use scpirs::{LoopbackSession, Response, Transactor, Value};
///
/// // The session echoes every line it receives before the instrument replies.
/// let session = LoopbackSession::new(vec!["APPL 5.0,1.2\n"], vec!["5.0,1.2\n"]).with_echo();
/// let mut scpi = Transactor::new(session);
/// scpi.set_settle_delay(Duration::ZERO);
///
/// let resp = scpi.command(&["APPL".into(), 5.0.into(), 1.2.into()]).unwrap();
/// assert_eq!(resp, Some(Response::List(vec![Value::Real(5.0), Value::Real(1.2)])));
/// ```
#[derive(Debug)]
pub struct Transactor<T: Transport> {
    transport: T,
    echo: Option<Vec<u8>>,
    settle_delay: Duration,
    reset_delay: Duration,
}

impl<T: Transport> Transactor<T> {
    /// Create a new transactor that talks through the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            echo: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
            reset_delay: DEFAULT_RESET_DELAY,
        }
    }

    /// Get the delay between the bus going idle and sending a new command.
    pub fn get_settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Set the delay between the bus going idle and sending a new command.
    ///
    /// The default is [`DEFAULT_SETTLE_DELAY`].
    pub fn set_settle_delay(&mut self, delay: Duration) {
        self.settle_delay = delay;
    }

    /// Get the time that is waited after a reset before the instrument is queried again.
    pub fn get_reset_delay(&self) -> Duration {
        self.reset_delay
    }

    /// Set the time that is waited after a reset before the instrument is queried again.
    ///
    /// The default is [`DEFAULT_RESET_DELAY`].
    pub fn set_reset_delay(&mut self, delay: Duration) {
        self.reset_delay = delay;
    }

    /// The echo marker of the exchange currently running.
    ///
    /// This is only ever set while an exchange is running, i.e., it is `None` whenever a call to
    /// the transactor has returned.
    pub fn echo_marker(&self) -> Option<&[u8]> {
        self.echo.as_deref()
    }

    /// Access the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably access the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the transactor and return the underlying transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send a command with [`DEFAULT_COMMAND_TIMEOUT`] and return the parsed response.
    ///
    /// See [`Transactor::execute`] for details.
    pub fn command(&mut self, args: &[Value]) -> Result<Option<Response>, ScpiError> {
        self.execute(args, DEFAULT_COMMAND_TIMEOUT)
    }

    /// Send a command and return the parsed response.
    ///
    /// The response is the first line received that does not contain the echo of the command.
    /// Only this one line is read, even if the instrument sends more. If this line is blank, or if
    /// no line arrives within `timeout`, `None` is returned: a timeout is not an error.
    ///
    /// The timeout of the transport is set to `timeout` for the duration of the exchange and
    /// restored afterwards, also if an error occurs.
    ///
    /// # Arguments
    /// * `args` - Command mnemonic followed by its arguments.
    /// * `timeout` - Time to wait for each line of the reply.
    pub fn execute(
        &mut self,
        args: &[Value],
        timeout: Duration,
    ) -> Result<Option<Response>, ScpiError> {
        let line = encode(args)?;

        let mut transport = TimeoutGuard::install(&mut self.transport, timeout)?;
        let result = exchange(
            &mut *transport,
            &mut self.echo,
            &line,
            timeout,
            self.settle_delay,
        );
        self.echo = None;

        result
    }

    /// Send a command without waiting for a reply.
    ///
    /// Waits until no output is pending on the transport before the line is written.
    pub fn write_line(&mut self, args: &[Value]) -> Result<(), ScpiError> {
        let line = encode(args)?;
        let timeout = self.transport.get_timeout();
        wait_output_drained(&mut self.transport, timeout)?;
        send(&mut self.transport, &line)
    }

    /// Send a command with [`DEFAULT_RAW_LINES_TIMEOUT`] and return all raw lines received.
    pub fn raw_lines(&mut self, args: &[Value]) -> Result<Vec<Vec<u8>>, ScpiError> {
        self.raw_lines_with_timeout(args, DEFAULT_RAW_LINES_TIMEOUT)
    }

    /// Send a command and collect the unparsed lines that arrive until a read times out.
    ///
    /// No echo suppression is done, this is meant for debugging instruments.
    pub fn raw_lines_with_timeout(
        &mut self,
        args: &[Value],
        timeout: Duration,
    ) -> Result<Vec<Vec<u8>>, ScpiError> {
        let line = encode(args)?;

        let mut transport = TimeoutGuard::install(&mut self.transport, timeout)?;
        discard_stale(&mut *transport)?;
        wait_output_drained(&mut *transport, timeout)?;
        send(&mut *transport, &line)?;
        transport.read_lines_until_timeout()
    }
}

/// Run steps one to three of an exchange. The caller takes care of cleaning up.
fn exchange<T: Transport>(
    transport: &mut T,
    echo: &mut Option<Vec<u8>>,
    line: &[u8],
    timeout: Duration,
    settle_delay: Duration,
) -> Result<Option<Response>, ScpiError> {
    transport.flush()?;
    wait_output_drained(transport, timeout)?;
    thread::sleep(settle_delay);
    discard_stale(transport)?;

    send(transport, line)?;
    let echo = echo.insert(line.to_vec());

    let mut responses = Vec::new();
    while responses.is_empty() {
        let raw = transport.read_line()?;
        if contains(&raw, echo) {
            debug!("Discarding echo of the command: '{}'", escaped(&raw));
            continue;
        }
        if raw.is_empty() {
            debug!("No reply to '{}' within {timeout:?}", escaped(line));
        }
        match parse(&raw) {
            Some(Response::Single(Value::Text(text))) if text.is_empty() => break,
            Some(resp) => responses.push(resp),
            None => break,
        }
    }

    Ok(collapse(responses))
}

/// Collapse the accepted responses of an exchange into one.
///
/// Several responses are flattened into one list in the order they were received.
fn collapse(mut responses: Vec<Response>) -> Option<Response> {
    match responses.len() {
        0 => None,
        1 => responses.pop(),
        _ => Response::collapse(
            responses
                .into_iter()
                .flat_map(Response::into_values)
                .collect(),
        ),
    }
}

/// Busy-wait until no output is pending, at most for `timeout`.
fn wait_output_drained<T: Transport>(
    transport: &mut T,
    timeout: Duration,
) -> Result<(), ScpiError> {
    let tic = Instant::now();
    while transport.out_waiting()? > 0 {
        if tic.elapsed() > timeout {
            warn!("Output still pending after {timeout:?}, sending anyway");
            break;
        }
        std::hint::spin_loop();
    }
    Ok(())
}

/// Read and drop whatever is waiting on the input.
fn discard_stale<T: Transport>(transport: &mut T) -> Result<(), ScpiError> {
    let stale = transport.read_all_buffered()?;
    if !stale.is_empty() {
        debug!("Discarding {} stale bytes: '{}'", stale.len(), escaped(&stale));
    }
    Ok(())
}

/// Write a line and flush the transport.
fn send<T: Transport>(transport: &mut T, line: &[u8]) -> Result<(), ScpiError> {
    trace!("Sending '{}'", escaped(line));
    transport.write_raw(line)?;
    transport.flush()
}

/// Check if `haystack` contains `needle` as a contiguous subsequence.
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|win| win == needle)
}

//! Tests for the [`Transactor`] using scripted loopback sessions.

use std::time::Duration;

use rstest::*;

use scpirs::{
    DEFAULT_COMMAND_TIMEOUT, LoopbackSession, Response, ScpiError, Transactor, Transport, Value,
};

const TIMEOUT: Duration = Duration::from_millis(300);

/// Create a transactor for the given transcript without settle delay.
fn crt_scpi(host2inst: Vec<&str>, inst2host: Vec<&str>) -> Transactor<LoopbackSession> {
    crt_scpi_session(LoopbackSession::new(host2inst, inst2host))
}

/// Create a transactor for an already configured loopback session without settle delay.
fn crt_scpi_session(session: LoopbackSession) -> Transactor<LoopbackSession> {
    let mut scpi = Transactor::new(session);
    scpi.set_settle_delay(Duration::ZERO);
    scpi
}

fn text(val: &str) -> Value {
    Value::Text(val.to_string())
}

#[fixture]
fn emp_scpi() -> Transactor<LoopbackSession> {
    crt_scpi(vec![], vec![])
}

#[rstest]
fn test_default_settle_delay() {
    let scpi = Transactor::new(LoopbackSession::new(vec![], vec![]));
    assert_eq!(scpi.get_settle_delay(), Duration::from_millis(250));
}

#[rstest]
fn test_query_without_echo() {
    let mut scpi = crt_scpi(vec!["*IDN?\n"], vec!["MODEL123\n"]);
    let resp = scpi.execute(&["*IDN?".into()], TIMEOUT).unwrap();
    assert_eq!(resp, Some(Response::Single(text("MODEL123"))));
}

/// Every line is echoed by the session before the reply arrives.
#[rstest]
fn test_apply_with_echo() {
    let session = LoopbackSession::new(vec!["APPL 5.0,1.2\n"], vec!["5.0,1.2\n"]).with_echo();
    let mut scpi = crt_scpi_session(session);

    let resp = scpi
        .execute(&["APPL".into(), 5.0.into(), 1.2.into()], TIMEOUT)
        .unwrap();
    assert_eq!(
        resp,
        Some(Response::List(vec![Value::Real(5.0), Value::Real(1.2)]))
    );
}

/// The echo is part of the instrument's transcript, followed by the real reply.
#[rstest]
fn test_scripted_echo_is_discarded() {
    let mut scpi = crt_scpi(vec!["APPL?\n"], vec!["APPL?\n", "5.0,1.2\n"]);
    let resp = scpi.execute(&["APPL?".into()], TIMEOUT).unwrap().unwrap();
    assert_eq!(resp.f64_at(1).unwrap(), 1.2);
}

/// Lines that contain the echo somewhere are discarded as well.
#[rstest]
fn test_echo_as_substring_is_discarded() {
    let mut scpi = crt_scpi(
        vec![":MEAS:VOLT?\n"],
        vec!["> :MEAS:VOLT?\n", ":MEAS:VOLT?\n", "4.998\n"],
    );
    let resp = scpi.execute(&[":MEAS:VOLT?".into()], TIMEOUT).unwrap();
    assert_eq!(resp, Some(Response::Single(Value::Real(4.998))));
}

/// Only the first accepted line is read. A second line of a reply is taken as the reply to the
/// next query.
#[rstest]
fn test_one_line_per_call() {
    let mut scpi = crt_scpi(vec!["*ESR?\n", "*OPC?\n"], vec!["32\n", "99\n", "1\n"]);
    let resp = scpi.execute(&["*ESR?".into()], TIMEOUT).unwrap();
    assert_eq!(resp, Some(Response::Single(Value::Int(32))));

    let resp = scpi.execute(&["*OPC?".into()], TIMEOUT).unwrap();
    assert_eq!(resp, Some(Response::Single(Value::Int(99))));

    assert_eq!(scpi.transport_mut().read_line().unwrap(), b"1\n");
}

#[rstest]
fn test_blank_reply_is_none() {
    let mut scpi = crt_scpi(vec![":CURR:PROT:CLE\n"], vec!["\r\n"]);
    scpi.transport_mut().set_timeout(Duration::from_secs(1)).unwrap();

    let resp = scpi.execute(&[":CURR:PROT:CLE".into()], TIMEOUT).unwrap();
    assert_eq!(resp, None);
    assert_eq!(scpi.transport().get_timeout(), Duration::from_secs(1));
}

#[rstest]
fn test_blank_reply_after_echo_is_none() {
    let session = LoopbackSession::new(vec!["*RST\n"], vec!["\n"]).with_echo();
    let mut scpi = crt_scpi_session(session);
    assert_eq!(scpi.execute(&["*RST".into()], TIMEOUT).unwrap(), None);
}

#[rstest]
fn test_timeout_is_none() {
    let mut scpi = crt_scpi(vec!["*IDN?\n"], vec![]);
    let resp = scpi.execute(&["*IDN?".into()], TIMEOUT).unwrap();
    assert_eq!(resp, None);
}

/// An echo that is never followed by a reply results in a timeout.
#[rstest]
fn test_only_echo_is_none() {
    let session = LoopbackSession::new(vec![":OUTP?\n"], vec![]).with_echo();
    let mut scpi = crt_scpi_session(session);
    assert_eq!(scpi.execute(&[":OUTP?".into()], TIMEOUT).unwrap(), None);
}

#[rstest]
fn test_only_delimiters_is_none() {
    let mut scpi = crt_scpi(vec!["*OPC?\n"], vec!["?;\n"]);
    assert_eq!(scpi.execute(&["*OPC?".into()], TIMEOUT).unwrap(), None);
}

/// A line that was cut off by the timeout is still parsed.
#[rstest]
fn test_partial_line() {
    let mut scpi = crt_scpi(vec![":MEAS:CURR?\n"], vec!["0.51"]);
    let resp = scpi.execute(&[":MEAS:CURR?".into()], TIMEOUT).unwrap();
    assert_eq!(resp, Some(Response::Single(Value::Real(0.51))));
}

#[rstest]
fn test_stale_bytes_are_discarded() {
    let session = LoopbackSession::new(vec![":OUTP?\n"], vec!["ON\n"]).with_stale(b"OFF\n12");
    let mut scpi = crt_scpi_session(session);
    let resp = scpi.execute(&[":OUTP?".into()], TIMEOUT).unwrap().unwrap();
    assert!(resp.is_on());
}

#[rstest]
fn test_pending_output_is_drained() {
    let session = LoopbackSession::new(vec!["*OPC?\n"], vec!["1\n"]).with_out_waiting(5);
    let mut scpi = crt_scpi_session(session);
    let resp = scpi.execute(&["*OPC?".into()], TIMEOUT).unwrap();
    assert_eq!(resp, Some(Response::Single(Value::Int(1))));
    assert_eq!(scpi.transport_mut().out_waiting().unwrap(), 0);
}

/// The per-call timeout is active while reading, the previous one is restored afterwards.
#[rstest]
#[case(vec!["MODEL123\n"])]
#[case(vec![])]
#[case(vec!["\n"])]
fn test_timeout_restored(#[case] inst2host: Vec<&str>) {
    let session = LoopbackSession::new(vec!["*IDN?\n"], inst2host).with_echo();
    let mut scpi = crt_scpi_session(session);
    let before = Duration::from_millis(1234);
    scpi.transport_mut().set_timeout(before).unwrap();

    scpi.execute(&["*IDN?".into()], TIMEOUT).unwrap();

    assert_eq!(scpi.transport().get_timeout(), before);
    assert!(!scpi.transport().read_timeouts().is_empty());
    assert!(scpi.transport().read_timeouts().iter().all(|t| *t == TIMEOUT));
    assert!(scpi.echo_marker().is_none());
}

#[rstest]
fn test_command_uses_default_timeout() {
    let mut scpi = crt_scpi(vec!["*ESR?\n"], vec!["0\n"]);
    scpi.command(&["*ESR?".into()]).unwrap();
    assert_eq!(scpi.transport().read_timeouts(), &[DEFAULT_COMMAND_TIMEOUT]);
}

#[rstest]
fn test_empty_command(mut emp_scpi: Transactor<LoopbackSession>) {
    emp_scpi.transport_mut().set_timeout(Duration::from_secs(2)).unwrap();
    assert!(matches!(
        emp_scpi.execute(&[], TIMEOUT),
        Err(ScpiError::EmptyCommand)
    ));
    assert!(matches!(
        emp_scpi.write_line(&[]),
        Err(ScpiError::EmptyCommand)
    ));
    assert_eq!(emp_scpi.transport().get_timeout(), Duration::from_secs(2));
}

#[rstest]
fn test_closed_transport(mut emp_scpi: Transactor<LoopbackSession>) {
    let before = emp_scpi.transport().get_timeout();
    emp_scpi.transport_mut().close();

    assert!(matches!(
        emp_scpi.execute(&["*IDN?".into()], TIMEOUT),
        Err(ScpiError::TransportUnavailable(_))
    ));
    assert_eq!(emp_scpi.transport().get_timeout(), before);
    assert!(emp_scpi.echo_marker().is_none());

    assert!(matches!(
        emp_scpi.write_line(&["*RST".into()]),
        Err(ScpiError::TransportUnavailable(_))
    ));
}

#[rstest]
fn test_write_line() {
    let mut scpi = crt_scpi(vec![":VOLT 12.5\n", ":OUTP ON\n"], vec![]);
    scpi.write_line(&[":VOLT".into(), 12.5.into()]).unwrap();
    scpi.write_line(&[":OUTP".into(), "ON".into()]).unwrap();
}

#[rstest]
fn test_raw_lines() {
    let session = LoopbackSession::new(vec!["HELP?\n"], vec!["line 1\n", "line 2\n", "end"])
        .with_stale(b"junk\n");
    let mut scpi = crt_scpi_session(session);

    let lines = scpi
        .raw_lines_with_timeout(&["HELP?".into()], TIMEOUT)
        .unwrap();
    assert_eq!(
        lines,
        vec![b"line 1\n".to_vec(), b"line 2\n".to_vec(), b"end".to_vec()]
    );
    assert_eq!(scpi.transport().get_timeout(), Duration::from_secs(1));
}

#[rstest]
fn test_raw_lines_keep_echo() {
    let session = LoopbackSession::new(vec!["*IDN?\n"], vec!["MODEL123\n"]).with_echo();
    let mut scpi = crt_scpi_session(session);

    let lines = scpi.raw_lines(&["*IDN?".into()]).unwrap();
    assert_eq!(lines, vec![b"*IDN?\n".to_vec(), b"MODEL123\n".to_vec()]);
}

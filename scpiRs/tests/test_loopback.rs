//! Test cases for the LoopbackSession.

use std::time::Duration;

use rstest::*;

use scpirs::{LoopbackSession, ScpiError, Transport};

/// Create a loopback session that contains no commands.
#[fixture]
fn emp_lbk() -> LoopbackSession {
    LoopbackSession::new(vec![], vec![])
}

/// Ensure `finalize` method passes if an empty loopback session is used.
#[rstest]
fn finalize_test(mut emp_lbk: LoopbackSession) {
    emp_lbk.finalize();
}

/// Ensure the session panics if entries are left over when it is dropped.
#[rstest]
#[case(vec!["cmd\n"], vec![])]
#[case(vec![], vec!["resp\n"])]
#[case(vec!["cmd\n"], vec!["resp\n"])]
#[should_panic]
fn finalize_test_panic(#[case] from_host: Vec<&str>, #[case] from_inst: Vec<&str>) {
    let _ = LoopbackSession::new(from_host, from_inst);
}

#[rstest]
fn write_raw() {
    let mut lbk = LoopbackSession::new(vec!["cmd1\n", "cmd2\n"], vec![]);
    lbk.write_raw(b"cmd1\n").unwrap();
    lbk.write_raw(b"cmd2\n").unwrap();
}

#[rstest]
#[should_panic]
fn write_raw_mismatch() {
    let mut lbk = LoopbackSession::new(vec!["cmd1\n"], vec![]);
    let _ = lbk.write_raw(b"cmd3\n");
}

#[rstest]
fn read_lines_in_order() {
    let mut lbk = LoopbackSession::new(vec![], vec!["resp1\n", "resp2\nresp3\n"]);
    assert_eq!(lbk.read_line().unwrap(), b"resp1\n");
    assert_eq!(lbk.read_line().unwrap(), b"resp2\n");
    assert_eq!(lbk.read_line().unwrap(), b"resp3\n");
    assert!(lbk.read_line().unwrap().is_empty());
}

/// An empty entry simulates a read that timed out.
#[rstest]
fn read_empty_entry() {
    let mut lbk = LoopbackSession::new(vec![], vec!["", "late\n"]);
    assert!(lbk.read_line().unwrap().is_empty());
    assert_eq!(lbk.read_line().unwrap(), b"late\n");
}

#[rstest]
fn echo() {
    let mut lbk = LoopbackSession::new(vec!["*IDN?\n"], vec!["MODEL123\n"]).with_echo();
    lbk.write_raw(b"*IDN?\n").unwrap();
    assert_eq!(lbk.read_line().unwrap(), b"*IDN?\n");
    assert_eq!(lbk.read_line().unwrap(), b"MODEL123\n");
}

/// Only bytes that already arrived are drained, scripted replies are not.
#[rstest]
fn read_all_buffered() {
    let mut lbk = LoopbackSession::new(vec![], vec!["resp\n"]).with_stale(b"old\nol");
    assert_eq!(lbk.read_all_buffered().unwrap(), b"old\nol");
    assert!(lbk.read_all_buffered().unwrap().is_empty());
    assert_eq!(lbk.read_line().unwrap(), b"resp\n");
}

#[rstest]
fn read_lines_until_timeout() {
    let mut lbk = LoopbackSession::new(vec![], vec!["a\n", "b\n", "c"]);
    assert_eq!(
        lbk.read_lines_until_timeout().unwrap(),
        vec![b"a\n".to_vec(), b"b\n".to_vec(), b"c".to_vec()]
    );
}

#[rstest]
fn out_waiting() {
    let mut lbk = LoopbackSession::new(vec![], vec![]).with_out_waiting(2);
    assert_eq!(lbk.out_waiting().unwrap(), 2);
    assert_eq!(lbk.out_waiting().unwrap(), 1);
    assert_eq!(lbk.out_waiting().unwrap(), 0);
    assert_eq!(lbk.out_waiting().unwrap(), 0);
}

#[rstest]
fn timeout(mut emp_lbk: LoopbackSession) {
    assert_eq!(emp_lbk.get_timeout(), Duration::from_secs(1));
    emp_lbk.set_timeout(Duration::from_millis(10)).unwrap();
    assert_eq!(emp_lbk.get_timeout(), Duration::from_millis(10));
    assert!(emp_lbk.read_line().unwrap().is_empty());
    assert_eq!(emp_lbk.read_timeouts(), &[Duration::from_millis(10)]);
}

#[rstest]
fn closed(mut emp_lbk: LoopbackSession) {
    emp_lbk.close();
    assert!(matches!(
        emp_lbk.write_raw(b"cmd\n"),
        Err(ScpiError::TransportUnavailable(_))
    ));
    assert!(matches!(
        emp_lbk.flush(),
        Err(ScpiError::TransportUnavailable(_))
    ));
    assert!(matches!(
        emp_lbk.read_line(),
        Err(ScpiError::TransportUnavailable(_))
    ));
    assert!(matches!(
        emp_lbk.read_all_buffered(),
        Err(ScpiError::TransportUnavailable(_))
    ));
}

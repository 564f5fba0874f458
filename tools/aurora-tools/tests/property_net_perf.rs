//! net-perf against a local listener.
//!
//! - The receiver sees an 8-byte big-endian length followed by exactly that
//!   many fill bytes, for any size/chunk combination.
//! - Zero bytes still sends the header and reports `sent_bytes=0`.
//! - A zero chunk is rejected before any socket is opened.
//! - With nobody listening, the connect window expires with a connect error.

use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use aurora_tools::error::ToolError;
use aurora_tools::net_perf::{connect_with_retry, run, SendPlan, FILL_BYTE};
use proptest::prelude::*;

/// Accept one connection and return everything it sent.
fn receive_once(listener: TcpListener) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        data
    })
}

fn local_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[test]
fn zero_bytes_sends_header_only() {
    let (listener, port) = local_listener();
    let receiver = receive_once(listener);

    let plan = SendPlan::new("127.0.0.1", port, 0, 64 * 1024, 5.0).unwrap();
    let report = run(&plan).unwrap();
    assert_eq!(report.sent_bytes, 0);
    assert!(report.to_string().starts_with("net-perf: sent_bytes=0 duration_ms="));

    let data = receiver.join().unwrap();
    assert_eq!(data, [0u8; 8]);
}

#[test]
fn chunk_zero_rejected_before_connecting() {
    // Nothing listens here; a connect attempt would fail differently.
    let err = SendPlan::new("127.0.0.1", 1, 1024, 0, 5.0).unwrap_err();
    assert!(matches!(err, ToolError::InvalidArgument(_)));
    assert_eq!(err.exit_status(), 2);
}

#[test]
fn unbounded_connect_timeout_still_connects() {
    let (listener, port) = local_listener();
    let receiver = receive_once(listener);

    let plan = SendPlan::new("127.0.0.1", port, 16, 4, 1e19).unwrap();
    let report = run(&plan).unwrap();
    assert_eq!(report.sent_bytes, 16);
    assert_eq!(receiver.join().unwrap().len(), 8 + 16);
}

#[test]
fn closed_port_exhausts_retry_window() {
    let (listener, port) = local_listener();
    drop(listener);

    let err = connect_with_retry("127.0.0.1", port, Duration::from_millis(250)).unwrap_err();
    assert!(matches!(err, ToolError::Connect(_)));
    assert_eq!(err.exit_status(), 1);
    assert!(err.to_string().starts_with("connect failed ("));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn receiver_sees_length_then_payload(bytes in 0u64..200_000, chunk in 1usize..70_000) {
        let (listener, port) = local_listener();
        let receiver = receive_once(listener);

        let plan = SendPlan::new("127.0.0.1", port, bytes, chunk, 5.0).unwrap();
        let report = run(&plan).unwrap();
        prop_assert_eq!(report.sent_bytes, bytes);

        let data = receiver.join().unwrap();
        prop_assert_eq!(data.len() as u64, 8 + bytes);
        let mut header = [0u8; 8];
        header.copy_from_slice(&data[..8]);
        prop_assert_eq!(u64::from_be_bytes(header), bytes);
        prop_assert!(data[8..].iter().all(|&b| b == FILL_BYTE));
    }
}

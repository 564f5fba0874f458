//! `net-perf` sender: a length-prefixed TCP stream for throughput baselines.
//!
//! Wire format: an 8-byte big-endian payload length, then that many `b'x'`
//! bytes written in chunks of at most `--chunk` bytes. The receiver side
//! lives in the guest (`net_bench`).

use std::cmp;
use std::fmt;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cli::NetPerfCli;
use crate::error::ToolError;

/// Pause between connection attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Upper bound on a single connection attempt.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);
pub const FILL_BYTE: u8 = b'x';

/// A validated send request.
#[derive(Clone, Debug, PartialEq)]
pub struct SendPlan {
    pub host: String,
    pub port: u16,
    pub bytes: u64,
    pub chunk: usize,
    pub connect_timeout: Duration,
}

impl SendPlan {
    /// Check the arguments before any socket is opened.
    pub fn new(
        host: &str,
        port: u16,
        bytes: u64,
        chunk: usize,
        connect_timeout_secs: f64,
    ) -> Result<Self, ToolError> {
        if chunk == 0 {
            return Err(ToolError::InvalidArgument("chunk must be > 0".to_string()));
        }
        let connect_timeout = Duration::try_from_secs_f64(connect_timeout_secs).map_err(|_| {
            ToolError::InvalidArgument(format!(
                "connect-timeout must be a non-negative number of seconds, got {connect_timeout_secs}"
            ))
        })?;
        Ok(Self {
            host: host.to_string(),
            port,
            bytes,
            chunk,
            connect_timeout,
        })
    }

    pub fn from_cli(cli: &NetPerfCli) -> Result<Self, ToolError> {
        Self::new(&cli.host, cli.port, cli.bytes, cli.chunk, cli.connect_timeout)
    }

    /// Size of the reusable fill buffer: one chunk, but never more than the
    /// payload and never empty.
    pub fn buffer_len(&self) -> usize {
        cmp::min(self.chunk as u64, cmp::max(1, self.bytes)) as usize
    }
}

/// Outcome of a completed send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub sent_bytes: u64,
    pub duration_ms: u64,
}

impl fmt::Display for SendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "net-perf: sent_bytes={} duration_ms={}",
            self.sent_bytes, self.duration_ms
        )
    }
}

fn connect_once(host: &str, port: u16) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, ATTEMPT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {host}"))
    }))
}

/// Retry connecting until `timeout` elapses, keeping the last error.
///
/// A timeout too large to add to the current instant never expires.
pub fn connect_with_retry(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, ToolError> {
    let deadline = Instant::now().checked_add(timeout);
    let mut last_err = None;
    let mut attempts = 0u32;
    while deadline.map_or(true, |d| Instant::now() < d) {
        attempts += 1;
        match connect_once(host, port) {
            Ok(stream) => {
                log::debug!("connected to {host}:{port} after {attempts} attempt(s)");
                return Ok(stream);
            }
            Err(e) => {
                log::debug!("connect attempt {attempts} to {host}:{port} failed: {e}");
                last_err = Some(e);
                thread::sleep(RETRY_INTERVAL);
            }
        }
    }
    Err(ToolError::Connect(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::TimedOut, "connection timed out")
    })))
}

/// Write the length header and `bytes` fill bytes to `w`.
///
/// Returns the number of payload bytes written. A write that accepts zero
/// bytes means the peer closed the connection.
pub fn send_stream<W: Write>(w: &mut W, bytes: u64, buffer_len: usize) -> Result<u64, ToolError> {
    w.write_all(&bytes.to_be_bytes())
        .map_err(ToolError::HeaderSend)?;

    let buf = vec![FILL_BYTE; buffer_len.max(1)];
    let mut remaining = bytes;
    let mut sent_total = 0u64;
    while remaining > 0 {
        let len = cmp::min(remaining, buf.len() as u64) as usize;
        match w.write(&buf[..len]) {
            Ok(0) => return Err(ToolError::SendReturnedZero),
            Ok(n) => {
                remaining -= n as u64;
                sent_total += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ToolError::Send(e)),
        }
    }
    w.flush().map_err(ToolError::Send)?;
    Ok(sent_total)
}

/// Connect, send, half-close, and time the whole exchange.
pub fn run(plan: &SendPlan) -> Result<SendReport, ToolError> {
    let start = Instant::now();
    let mut stream = connect_with_retry(&plan.host, plan.port, plan.connect_timeout)?;
    log::info!(
        "sending {} bytes to {}:{} in chunks of {}",
        plan.bytes,
        plan.host,
        plan.port,
        plan.buffer_len()
    );

    let sent_bytes = send_stream(&mut stream, plan.bytes, plan.buffer_len())?;
    // The receiver may already have closed its side.
    let _ = stream.shutdown(Shutdown::Write);

    Ok(SendReport {
        sent_bytes,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `limit` bytes per write, then fails with `fail_after`.
    struct Throttled {
        data: Vec<u8>,
        limit: usize,
        fail_after: Option<(usize, io::ErrorKind)>,
        zero_after: Option<usize>,
    }

    impl Throttled {
        fn new(limit: usize) -> Self {
            Self {
                data: Vec::new(),
                limit,
                fail_after: None,
                zero_after: None,
            }
        }
    }

    impl Write for Throttled {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some((after, kind)) = self.fail_after {
                if self.data.len() >= after {
                    return Err(io::Error::new(kind, "boom"));
                }
            }
            if let Some(after) = self.zero_after {
                if self.data.len() >= after {
                    return Ok(0);
                }
            }
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn zero_bytes_sends_only_header() {
        let mut w = Throttled::new(usize::MAX);
        let sent = send_stream(&mut w, 0, 1).unwrap();
        assert_eq!(sent, 0);
        assert_eq!(w.data, [0u8; 8]);
    }

    #[test]
    fn header_is_big_endian_length() {
        let mut w = Throttled::new(usize::MAX);
        send_stream(&mut w, 0x0102, 16).unwrap();
        assert_eq!(&w.data[..8], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(w.data.len(), 8 + 0x0102);
        assert!(w.data[8..].iter().all(|&b| b == FILL_BYTE));
    }

    #[test]
    fn short_writes_are_continued() {
        let mut w = Throttled::new(3);
        let sent = send_stream(&mut w, 100, 64).unwrap();
        assert_eq!(sent, 100);
        assert_eq!(w.data.len(), 108);
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut w = Throttled::new(usize::MAX);
        w.zero_after = Some(8);
        let err = send_stream(&mut w, 10, 4).unwrap_err();
        assert!(matches!(err, ToolError::SendReturnedZero));
        assert_eq!(err.exit_status(), 1);
    }

    #[test]
    fn header_failure_is_distinguished() {
        let mut w = Throttled::new(usize::MAX);
        w.fail_after = Some((0, io::ErrorKind::BrokenPipe));
        assert!(matches!(
            send_stream(&mut w, 10, 4),
            Err(ToolError::HeaderSend(_))
        ));
    }

    #[test]
    fn payload_failure_is_distinguished() {
        let mut w = Throttled::new(usize::MAX);
        w.fail_after = Some((12, io::ErrorKind::ConnectionReset));
        assert!(matches!(send_stream(&mut w, 10, 4), Err(ToolError::Send(_))));
    }

    #[test]
    fn chunk_zero_rejected() {
        let err = SendPlan::new("127.0.0.1", 1, 10, 0, 5.0).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument(_)));
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn bad_timeouts_rejected() {
        assert!(SendPlan::new("h", 1, 0, 1, -1.0).is_err());
        assert!(SendPlan::new("h", 1, 0, 1, f64::NAN).is_err());
        assert!(SendPlan::new("h", 1, 0, 1, f64::INFINITY).is_err());
        assert!(SendPlan::new("h", 1, 0, 1, 0.0).is_ok());
    }

    #[test]
    fn buffer_len_is_bounded_by_payload() {
        let plan = SendPlan::new("h", 1, 10, 64, 1.0).unwrap();
        assert_eq!(plan.buffer_len(), 10);
        let plan = SendPlan::new("h", 1, 0, 64, 1.0).unwrap();
        assert_eq!(plan.buffer_len(), 1);
        let plan = SendPlan::new("h", 1, 1 << 20, 64, 1.0).unwrap();
        assert_eq!(plan.buffer_len(), 64);
    }

    #[test]
    fn report_line_format() {
        let report = SendReport {
            sent_bytes: 0,
            duration_ms: 3,
        };
        assert_eq!(report.to_string(), "net-perf: sent_bytes=0 duration_ms=3");
    }

    #[test]
    fn zero_timeout_fails_without_attempting() {
        let err = connect_with_retry("127.0.0.1", 1, Duration::ZERO).unwrap_err();
        match err {
            ToolError::Connect(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected error: {other}"),
        }
    }
}

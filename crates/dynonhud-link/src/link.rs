use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::port::{LinkConfig, PortOpener, SystemPortOpener};

const READ_CHUNK_SIZE: usize = 256;

/// Connection manager for one physical serial link.
///
/// Lifecycle: constructed unopened → [`open`](Self::open) attempted → either
/// open (handle present) or closed (handle absent) → reset to closed by an
/// I/O failure or by [`start_reconnect`](Self::start_reconnect), forcing a
/// fresh open on the next cycle.
///
/// No operation returns an error to the caller: open and read failures are
/// logged and absorbed, and the next cycle retries. The control loop observes
/// link health only through [`is_open`](Self::is_open) and
/// [`is_time_to_reconnect`](Self::is_time_to_reconnect).
pub struct SerialLink<O = SystemPortOpener> {
    config: LinkConfig,
    opener: O,
    port: Option<Box<dyn Read + Send>>,
    /// Bytes of a line interrupted by a timeout, completed on the next read.
    pending: Vec<u8>,
    last_read: Option<Instant>,
}

impl SerialLink<SystemPortOpener> {
    /// Create an unopened link over the real serial device in `config`.
    pub fn new(config: LinkConfig) -> Self {
        Self::with_opener(config, SystemPortOpener)
    }
}

impl<O: PortOpener> SerialLink<O> {
    /// Sentinel age reported before any successful read, large enough that
    /// every staleness check sees a never-used link as overdue.
    const NEVER_READ: Duration = Duration::from_secs(90 * 60);

    /// Create an unopened link with an explicit port opener.
    pub fn with_opener(config: LinkConfig, opener: O) -> Self {
        Self {
            config,
            opener,
            port: None,
            pending: Vec::new(),
            last_read: None,
        }
    }

    /// Whether a port handle is currently held.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// The device path this link reads from.
    pub fn device(&self) -> &str {
        &self.config.device
    }

    /// The link configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Attempt to open the device. No-op while a handle is held.
    ///
    /// Failure is logged, never raised; the handle simply stays absent.
    pub fn open(&mut self) {
        if self.port.is_some() {
            return;
        }

        info!(
            device = %self.config.device,
            "ATTEMPTING to open serial connection"
        );

        match self.opener.open(&self.config) {
            Ok(port) => {
                self.port = Some(port);
                self.pending.clear();
                info!(device = %self.config.device, "OPENED serial connection");
            }
            Err(err) => {
                self.port = None;
                warn!(
                    device = %self.config.device,
                    error = %err,
                    "FAILED attempt to open serial connection"
                );
            }
        }
    }

    /// Read one newline-terminated line, bounded by the configured timeout.
    ///
    /// Without a handle this attempts [`open`](Self::open) and yields an
    /// empty string for the current cycle. A timed-out or empty read is not
    /// an error — the partial line is kept and completed next call. Any other
    /// I/O failure closes and drops the handle; the next call re-opens.
    pub fn read(&mut self) -> String {
        if self.port.is_none() {
            self.open();
            return String::new();
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(line) = self.take_pending_line() {
                info!(device = %self.config.device, raw = %line.trim_end(), "frame received");
                self.last_read = Some(Instant::now());
                return line;
            }

            let Some(port) = self.port.as_mut() else {
                return String::new();
            };

            match port.read(&mut chunk) {
                Ok(0) => return String::new(),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::TimedOut
                        || err.kind() == ErrorKind::WouldBlock =>
                {
                    return String::new();
                }
                Err(err) => {
                    warn!(
                        device = %self.config.device,
                        error = %err,
                        "serial read failed, dropping port handle"
                    );
                    self.port = None;
                    self.pending.clear();
                    return String::new();
                }
            }
        }
    }

    /// Pop the first complete line (terminator included) off the pending
    /// buffer, if one has accumulated.
    fn take_pending_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Time since the last successful read, or a 90-minute sentinel if no
    /// read has ever succeeded.
    pub fn time_since_last_read(&self) -> Duration {
        self.last_read.map_or(Self::NEVER_READ, |at| at.elapsed())
    }

    /// Whether the link has been silent long enough to warrant a full
    /// reconnect. True immediately for a link that has never produced data.
    pub fn is_time_to_reconnect(&self) -> bool {
        self.time_since_last_read() > self.config.idle_reconnect
    }

    /// Forget the handle and the last-read stamp, without requiring an
    /// observed I/O failure. The next [`read`](Self::read) re-opens.
    pub fn start_reconnect(&mut self) {
        debug!(device = %self.config.device, "starting reconnect");
        self.last_read = None;
        self.port = None;
        self.pending.clear();
    }
}

impl<O> std::fmt::Debug for SerialLink<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device", &self.config.device)
            .field("open", &self.port.is_some())
            .field("last_read", &self.last_read)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use crate::error::{LinkError, Result};

    use super::*;

    /// Replays scripted read outcomes, then times out forever.
    struct ScriptedPort {
        reads: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedPort {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    assert!(bytes.len() <= buf.len(), "scripted chunk too large");
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(err)) => Err(err),
                None => Err(io::Error::from(ErrorKind::TimedOut)),
            }
        }
    }

    /// Yields one scripted port per open attempt, then refuses to open.
    struct ScriptedOpener {
        ports: VecDeque<Result<ScriptedPort>>,
    }

    impl ScriptedOpener {
        fn single(port: ScriptedPort) -> Self {
            Self {
                ports: VecDeque::from([Ok(port)]),
            }
        }

        fn failing() -> Self {
            Self {
                ports: VecDeque::new(),
            }
        }
    }

    impl PortOpener for ScriptedOpener {
        fn open(&mut self, config: &LinkConfig) -> Result<Box<dyn Read + Send>> {
            match self.ports.pop_front() {
                Some(Ok(port)) => Ok(Box::new(port)),
                Some(Err(err)) => Err(err),
                None => Err(LinkError::Open {
                    device: config.device.clone(),
                    source: serialport::Error::new(
                        serialport::ErrorKind::NoDevice,
                        "no scripted port left",
                    ),
                }),
            }
        }
    }

    fn test_config() -> LinkConfig {
        LinkConfig::new("/dev/ttyTEST")
    }

    fn link_with(port: ScriptedPort) -> SerialLink<ScriptedOpener> {
        let mut link = SerialLink::with_opener(test_config(), ScriptedOpener::single(port));
        link.open();
        assert!(link.is_open());
        link
    }

    #[test]
    fn open_failure_is_absorbed() {
        let mut link = SerialLink::with_opener(test_config(), ScriptedOpener::failing());
        link.open();
        assert!(!link.is_open());
    }

    #[test]
    fn read_without_handle_attempts_open_and_returns_empty() {
        let port = ScriptedPort::new(vec![Ok(b"data\r\n".to_vec())]);
        let mut link = SerialLink::with_opener(test_config(), ScriptedOpener::single(port));

        assert!(!link.is_open());
        assert_eq!(link.read(), "");
        // The open attempt succeeded; the data arrives next cycle.
        assert!(link.is_open());
        assert_eq!(link.read(), "data\r\n");
    }

    #[test]
    fn assembles_line_across_partial_chunks() {
        let port = ScriptedPort::new(vec![
            Ok(b"2130".to_vec()),
            Ok(b"1133".to_vec()),
            Ok(b"\r\n".to_vec()),
        ]);
        let mut link = link_with(port);

        assert_eq!(link.read(), "21301133\r\n");
    }

    #[test]
    fn keeps_partial_line_across_a_timeout() {
        let port = ScriptedPort::new(vec![
            Ok(b"partial".to_vec()),
            Err(io::Error::from(ErrorKind::TimedOut)),
            Ok(b"-rest\r\n".to_vec()),
        ]);
        let mut link = link_with(port);

        assert_eq!(link.read(), "");
        assert!(link.is_open());
        assert_eq!(link.read(), "partial-rest\r\n");
    }

    #[test]
    fn surplus_bytes_become_the_next_line() {
        let port = ScriptedPort::new(vec![Ok(b"first\r\nsecond\r\n".to_vec())]);
        let mut link = link_with(port);

        assert_eq!(link.read(), "first\r\n");
        // Second line is served from the pending buffer without touching I/O.
        assert_eq!(link.read(), "second\r\n");
    }

    #[test]
    fn timeout_is_an_empty_read_not_a_failure() {
        let port = ScriptedPort::new(vec![]);
        let mut link = link_with(port);

        assert_eq!(link.read(), "");
        assert!(link.is_open());
    }

    #[test]
    fn io_error_drops_the_handle() {
        let port = ScriptedPort::new(vec![Err(io::Error::from(ErrorKind::BrokenPipe))]);
        let mut link = link_with(port);

        assert_eq!(link.read(), "");
        assert!(!link.is_open());
    }

    #[test]
    fn never_read_link_is_immediately_due_for_reconnect() {
        let link = SerialLink::with_opener(test_config(), ScriptedOpener::failing());
        assert!(link.time_since_last_read() >= Duration::from_secs(90 * 60));
        assert!(link.is_time_to_reconnect());
    }

    #[test]
    fn successful_read_resets_the_staleness_clock() {
        let port = ScriptedPort::new(vec![Ok(b"line\r\n".to_vec())]);
        let mut link = link_with(port);

        assert_eq!(link.read(), "line\r\n");
        assert!(link.time_since_last_read() < Duration::from_secs(1));
        assert!(!link.is_time_to_reconnect());
    }

    #[test]
    fn start_reconnect_forgets_handle_and_stamp() {
        let port = ScriptedPort::new(vec![Ok(b"line\r\n".to_vec())]);
        let mut link = link_with(port);
        assert_eq!(link.read(), "line\r\n");

        link.start_reconnect();
        assert!(!link.is_open());
        assert!(link.is_time_to_reconnect());

        // The next read attempts a fresh open (which the scripted opener
        // refuses, leaving the link closed).
        assert_eq!(link.read(), "");
        assert!(!link.is_open());
    }
}

//! Session builder for configuration

use super::{EngineConfig, Session, SessionState, Shared};
use crate::buffer::OutputBuffer;
use crate::result::ExpectError;
use crate::transport::{PtyTransport, Transport};
use portable_pty::PtySize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Default timeout for expect operations (in seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default PTY rows
const DEFAULT_PTY_ROWS: u16 = 24;

/// Default PTY columns
const DEFAULT_PTY_COLS: u16 = 80;

/// Default delay between two scans of the buffer (in milliseconds)
const DEFAULT_POLL_INTERVAL_MS: u64 = 5;

/// Default pause granted for final output once the process ends (in milliseconds)
const DEFAULT_EOF_GRACE_MS: u64 = 100;

/// Default number of trailing characters kept in error snapshots
const DEFAULT_SNAPSHOT_LIMIT: usize = 500;

/// Default maximum bytes moved per reader iteration
const DEFAULT_READ_CHUNK: usize = 4096;

/// Builder for configuring and spawning sessions.
///
/// # Defaults
///
/// - Timeout: 30 seconds
/// - PTY size: 24 rows × 80 columns
/// - Working directory: the caller's
/// - Poll interval: 5 ms
/// - EOF grace: 100 ms
/// - Snapshot limit: 500 characters
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::Session;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(60))
///     .pty_size(40, 120)
///     .env("TERM", "dumb")
///     .spawn("python3 -i")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    timeout: Duration,
    pty_size: PtySize,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    poll_interval: Duration,
    eof_grace: Duration,
    snapshot_limit: usize,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pty_size: PtySize {
                rows: DEFAULT_PTY_ROWS,
                cols: DEFAULT_PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
            cwd: None,
            env: Vec::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            eof_grace: Duration::from_millis(DEFAULT_EOF_GRACE_MS),
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
        }
    }

    /// Set the default timeout for expect operations.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set PTY (terminal) size.
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.pty_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self
    }

    /// Start the process in `dir` instead of the current directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set how long the engine sleeps between two scans of the buffer.
    ///
    /// This bounds how late a timeout can fire. Keep it short; the default
    /// is 5 ms.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how long to wait for final output after the process ends.
    pub fn eof_grace(mut self, grace: Duration) -> Self {
        self.eof_grace = grace;
        self
    }

    /// Set how many trailing characters of output error snapshots keep.
    pub fn snapshot_limit(mut self, limit: usize) -> Self {
        self.snapshot_limit = limit;
        self
    }

    /// Spawn `command` in a pseudo-terminal and start its session.
    ///
    /// The command line is split with shell quoting rules, so
    /// `sh -c 'echo hi'` passes `echo hi` as a single argument. No shell is
    /// involved otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The command string is empty or badly quoted
    /// - The PTY cannot be created
    /// - The process cannot be spawned
    /// - There is no tokio runtime to run the reader loop on
    pub fn spawn(self, command: &str) -> Result<Session, ExpectError> {
        let argv = shell_words::split(command)
            .map_err(|e| ExpectError::SpawnError(format!("{command:?}: {e}")))?;

        let transport = PtyTransport::spawn(&argv, self.pty_size, self.cwd.clone(), &self.env)?;
        self.attach(transport)
    }

    /// Start a session over an already connected transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(self, transport: impl Transport + 'static) -> Result<Session, ExpectError> {
        let (state, _) = watch::channel(SessionState::Created);
        let shared = Arc::new(Shared {
            transport: Arc::new(transport),
            buffer: Mutex::new(OutputBuffer::new()),
            state,
            config: EngineConfig {
                poll_interval: self.poll_interval,
                eof_grace: self.eof_grace,
                snapshot_limit: self.snapshot_limit,
                read_chunk: DEFAULT_READ_CHUNK,
            },
        });

        let session = Session::from_parts(shared, self.timeout);
        session.start_reader()?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_defaults() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.timeout, Duration::from_secs(30));
        assert_eq!(builder.pty_size.rows, 24);
        assert_eq!(builder.pty_size.cols, 80);
        assert_eq!(builder.poll_interval, Duration::from_millis(5));
        assert_eq!(builder.eof_grace, Duration::from_millis(100));
        assert_eq!(builder.snapshot_limit, 500);
    }

    #[test]
    fn test_attach_requires_runtime() {
        let (transport, _peer) = MemoryTransport::pair();
        let result = SessionBuilder::new().attach(transport);
        assert!(matches!(result, Err(ExpectError::SpawnError(_))));
    }

    #[tokio::test]
    async fn test_spawn_rejects_empty_command() {
        let result = SessionBuilder::new().spawn("   ");
        assert!(matches!(result, Err(ExpectError::SpawnError(_))));
    }

    #[tokio::test]
    async fn test_spawn_rejects_unbalanced_quotes() {
        let result = SessionBuilder::new().spawn("sh -c 'echo");
        assert!(matches!(result, Err(ExpectError::SpawnError(_))));
    }

    #[tokio::test]
    async fn test_attach_applies_timeout() {
        let (transport, _peer) = MemoryTransport::pair();
        let session = SessionBuilder::new()
            .timeout(Duration::from_millis(750))
            .attach(transport)
            .unwrap();
        assert_eq!(session.timeout(), Duration::from_millis(750));
    }
}

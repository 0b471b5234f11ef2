//! Session management for PTY-based process automation

mod builder;
mod engine;
mod reader;

pub use builder::SessionBuilder;

use crate::buffer::OutputBuffer;
use crate::pattern::Pattern;
use crate::result::{ExpectError, MatchResult};
use crate::transport::Transport;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// Line terminator appended by [`Session::send_line`]
#[cfg(windows)]
const LINE_TERMINATOR: &str = "\r\n";

/// Line terminator appended by [`Session::send_line`]
#[cfg(not(windows))]
const LINE_TERMINATOR: &str = "\n";

/// Lifecycle of a [`Session`].
///
/// `Created → Running → Ended → Closed`, where any state may jump straight
/// to `Closed` on an explicit close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Process spawned, reader loop not started yet.
    Created,
    /// Reader loop active. The process may still be running, or may have
    /// just exited with the reader still draining its last output.
    Running,
    /// The process is gone and its output fully captured. Buffered output
    /// can still be matched.
    Ended,
    /// Torn down. Every further operation fails with
    /// [`ExpectError::SessionClosed`].
    Closed,
}

impl SessionState {
    /// Whether the reader loop has stopped for good.
    pub fn is_finished(self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Closed)
    }
}

/// Timing and sizing knobs shared by the reader loop and the engine
#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
    pub(crate) poll_interval: Duration,
    pub(crate) eof_grace: Duration,
    pub(crate) snapshot_limit: usize,
    pub(crate) read_chunk: usize,
}

/// State shared between a session and its reader loop
pub(crate) struct Shared {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) buffer: AsyncMutex<OutputBuffer>,
    pub(crate) state: watch::Sender<SessionState>,
    pub(crate) config: EngineConfig,
}

/// A running process and everything needed to script it.
///
/// A `Session` owns a [`Transport`], a background reader loop that keeps
/// copying the process output into a buffer, and a default timeout for
/// expect calls. Output produced between expect calls is never lost: it
/// waits in the buffer until a match or [`Session::read`] consumes it.
///
/// All methods take `&self`, so a session can be shared as `Arc<Session>`.
/// Only one expect call should be in flight per session at a time; two
/// concurrent calls would race to consume the same output.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(10))
///     .spawn("python3 -i")?;
///
/// session.expect(Pattern::exact(">>>")).await?;
/// session.send_line("print(3 * 7)").await?;
/// session.expect(Pattern::exact("21")).await?;
/// session.send_line("exit()").await?;
/// session.expect(Pattern::Eof).await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    timeout: Mutex<Duration>,
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Spawn a command with default settings.
    ///
    /// Shorthand for `Session::builder().spawn(command)`. Must be called from
    /// within a tokio runtime.
    ///
    /// ```no_run
    /// use ptyexpect::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::spawn("sh -c 'echo hello; sleep 1'")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn(command: &str) -> Result<Self, ExpectError> {
        SessionBuilder::new().spawn(command)
    }

    /// Wait for a single pattern, using the session's default timeout.
    pub async fn expect(&self, pattern: Pattern) -> Result<MatchResult, ExpectError> {
        self.expect_any(&[pattern]).await
    }

    /// Wait for any of `patterns`, using the session's default timeout.
    ///
    /// The lowest-indexed pattern with a match in the buffer wins; its index
    /// is reported in [`MatchResult::pattern_index`].
    ///
    /// ```no_run
    /// use ptyexpect::{Pattern, Session};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let session = Session::spawn("make")?;
    /// let patterns = [
    ///     Pattern::exact("success"),
    ///     Pattern::exact("error"),
    ///     Pattern::Eof,
    /// ];
    ///
    /// match session.expect_any(&patterns).await?.pattern_index {
    ///     0 => println!("Success!"),
    ///     1 => println!("Error occurred"),
    ///     _ => println!("Process ended"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn expect_any(&self, patterns: &[Pattern]) -> Result<MatchResult, ExpectError> {
        self.expect_timeout(patterns, self.timeout()).await
    }

    /// Wait for any of `patterns` for at most `timeout`.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::InvalidPattern`] if `patterns` is empty
    /// - [`ExpectError::Timeout`] if nothing matched before the deadline
    /// - [`ExpectError::EndOfStream`] if the process ended, nothing matched
    ///   its remaining output and `patterns` holds no [`Pattern::Eof`]
    /// - [`ExpectError::SessionClosed`] if the session is or gets closed
    pub async fn expect_timeout(
        &self,
        patterns: &[Pattern],
        timeout: Duration,
    ) -> Result<MatchResult, ExpectError> {
        engine::expect(&self.shared, patterns, timeout).await
    }

    /// Send raw bytes to the process.
    ///
    /// Control characters go through untouched, e.g. `&[0x03]` for Ctrl-C
    /// or `&[0x04]` for Ctrl-D.
    pub async fn send(&self, data: &[u8]) -> Result<(), ExpectError> {
        self.ensure_open()?;
        let transport = Arc::clone(&self.shared.transport);
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || transport.write(&data))
            .await
            .map_err(|e| ExpectError::IoError(std::io::Error::other(e)))??;

        Ok(())
    }

    /// Send `line` followed by the platform line terminator.
    pub async fn send_line(&self, line: &str) -> Result<(), ExpectError> {
        let mut data = String::with_capacity(line.len() + LINE_TERMINATOR.len());
        data.push_str(line);
        data.push_str(LINE_TERMINATOR);
        self.send(data.as_bytes()).await
    }

    /// Take buffered output without matching.
    ///
    /// Drains up to `max_bytes` from the front of the buffer, or all of it
    /// when `None`. Does not wait for new output; an empty string means
    /// nothing was buffered.
    pub async fn read(&self, max_bytes: Option<usize>) -> Result<String, ExpectError> {
        self.ensure_open()?;
        let mut buffer = self.shared.buffer.lock().await;
        if buffer.is_empty() {
            return Ok(String::new());
        }
        let drained = buffer.drain(max_bytes);
        Ok(String::from_utf8_lossy(&drained).into_owned())
    }

    /// Buffered output, without consuming it.
    pub async fn pending(&self) -> String {
        self.shared.buffer.lock().await.text()
    }

    /// Check if the process is still alive.
    pub fn is_alive(&self) -> Result<bool, ExpectError> {
        self.ensure_open()?;
        Ok(self.shared.transport.is_alive())
    }

    /// Exit code of the process, once it has ended.
    pub fn exit_code(&self) -> Option<u32> {
        self.shared.transport.exit_code()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Default timeout used by [`Session::expect`] and [`Session::expect_any`].
    pub fn timeout(&self) -> Duration {
        *lock(&self.timeout)
    }

    /// Replace the default timeout.
    pub fn set_timeout(&self, timeout: Duration) {
        *lock(&self.timeout) = timeout;
    }

    /// Stop the reader loop, terminate the process and release the transport.
    ///
    /// Idempotent: closing an already closed session returns `Ok(())` and
    /// does nothing. Output still in the buffer is discarded with the session.
    pub async fn close(&self) -> Result<(), ExpectError> {
        if !self.mark_closed() {
            return Ok(());
        }

        let transport = Arc::clone(&self.shared.transport);
        tokio::task::spawn_blocking(move || transport.close())
            .await
            .map_err(|e| ExpectError::IoError(std::io::Error::other(e)))??;

        tracing::info!("session closed");
        Ok(())
    }

    fn from_parts(shared: Arc<Shared>, timeout: Duration) -> Self {
        Self {
            shared,
            reader: Mutex::new(None),
            timeout: Mutex::new(timeout),
        }
    }

    fn start_reader(&self) -> Result<(), ExpectError> {
        let handle = reader::start(Arc::clone(&self.shared))?;
        *lock(&self.reader) = Some(handle);
        Ok(())
    }

    /// Publish `Closed` and stop the reader. Returns false if already closed.
    fn mark_closed(&self) -> bool {
        let changed = self.shared.state.send_if_modified(|state| {
            let open = *state != SessionState::Closed;
            if open {
                *state = SessionState::Closed;
            }
            open
        });
        if changed {
            if let Some(handle) = lock(&self.reader).take() {
                handle.abort();
            }
        }
        changed
    }

    fn ensure_open(&self) -> Result<(), ExpectError> {
        if self.state() == SessionState::Closed {
            return Err(ExpectError::SessionClosed);
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.mark_closed() {
            if let Err(e) = self.shared.transport.close() {
                tracing::warn!(error = %e, "failed to close transport on drop");
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("timeout", &self.timeout())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

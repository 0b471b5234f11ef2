//! Error types for ptyexpect

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a session.
///
/// `Timeout` and `EndOfStream` are the two ordinary ways an expect call ends
/// without a match. Both carry a bounded snapshot of the unconsumed output so
/// the caller can see what the process actually printed. Nothing in this crate
/// retries on either; that decision belongs to the caller.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{ExpectError, Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(5))
///     .spawn("some-command")?;
///
/// match session.expect(Pattern::exact("done")).await {
///     Ok(result) => println!("Matched: {}", result.matched),
///     Err(ExpectError::Timeout { duration, snapshot }) => {
///         eprintln!("Timed out after {:?}, output so far: {:?}", duration, snapshot);
///     }
///     Err(ExpectError::EndOfStream { .. }) => {
///         eprintln!("Process exited unexpectedly");
///     }
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ExpectError {
    /// The deadline passed before any pattern matched.
    #[error("Timeout waiting for pattern after {duration:?}. Buffer: {snapshot:?}")]
    Timeout {
        /// Timeout the call was given
        duration: Duration,
        /// Tail of the unconsumed output
        snapshot: String,
    },

    /// The process ended and the pattern list held no `Pattern::Eof`.
    #[error("Process ended without matching pattern. Buffer: {snapshot:?}")]
    EndOfStream {
        /// Tail of the unconsumed output
        snapshot: String,
    },

    /// The session was closed before or during the operation.
    #[error("Session is closed")]
    SessionClosed,

    /// The pattern list or one of its patterns is unusable.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),

    /// A guarded call ran past its hard limit and was cut off.
    #[error("Operation interrupted after {limit:?}")]
    Interrupted {
        /// Hard limit that was exceeded
        limit: Duration,
    },

    /// No session is registered under this name.
    #[error("No session named {0:?}")]
    UnknownSession(String),

    /// I/O error from the transport.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// PTY creation or manipulation failed.
    #[error("PTY error: {0}")]
    PtyError(String),

    /// The command could not be spawned.
    #[error("Failed to spawn process: {0}")]
    SpawnError(String),
}

/// Errors related to pattern construction or pattern lists.
#[derive(Error, Debug)]
pub enum PatternError {
    /// `Pattern::regex()` was given invalid syntax.
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// An expect call was made with no patterns at all.
    #[error("Pattern list cannot be empty")]
    EmptyPatternList,
}

//! ptyexpect: scripted control of interactive programs
//!
//! ptyexpect drives programs that only offer an interactive, prompt-driven
//! terminal interface: shells, REPLs, debuggers. It spawns the program in a
//! pseudo-terminal (a native PTY on Unix, ConPTY on Windows), keeps copying
//! its output into a buffer in the background, and lets the caller send input
//! and wait for patterns to show up in that output, each wait bounded by a
//! deadline.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ptyexpect::{Pattern, Session};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::builder()
//!         .timeout(Duration::from_secs(10))
//!         .spawn("lldb ./mytool")?;
//!
//!     session.expect(Pattern::exact("(lldb)")).await?;
//!     session.send_line("breakpoint set --name main").await?;
//!
//!     let result = session.expect(Pattern::exact("(lldb)")).await?;
//!     println!("Output: {}", result.before);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Matching Rules
//!
//! - Every pass scans the **whole** unconsumed buffer, so output that arrived
//!   before the call (or in several fragments) is matched just the same.
//! - Among the patterns of one call, the lowest index with any match wins.
//! - A match consumes everything up to its end. What preceded it is returned
//!   as `before`; what follows stays buffered for the next call.
//! - [`Pattern::Eof`] matches once the process has ended and its remaining
//!   output does not satisfy an earlier text pattern. It hands over the whole
//!   buffer as `before`.
//! - Without a match the call fails with [`ExpectError::Timeout`] or
//!   [`ExpectError::EndOfStream`]. Neither is retried.
//!
//! ```rust,no_run
//! use ptyexpect::{Pattern, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let session = Session::spawn("sh")?;
//! let patterns = [
//!     Pattern::regex(r"\$ $")?,
//!     Pattern::exact("Permission denied"),
//!     Pattern::Eof,
//! ];
//! let result = session.expect_any(&patterns).await?;
//! match result.pattern_index {
//!     0 => println!("Prompt"),
//!     1 => println!("Denied"),
//!     _ => println!("Shell exited"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Several Sessions
//!
//! Sessions are independent. [`SessionRegistry`] keeps named sessions and
//! tracks which one is current, and [`CallGuard`] puts a hard limit on a
//! whole sequence of calls.

#![warn(missing_docs)]

mod buffer;
pub mod guard;
pub mod pattern;
mod registry;
mod result;
mod session;
pub mod transport;

// Public API exports
pub use guard::{CallGuard, GuardStrategy};
pub use pattern::Pattern;
pub use registry::SessionRegistry;
pub use result::{ExpectError, MatchResult, PatternError};
pub use session::{Session, SessionBuilder, SessionState};

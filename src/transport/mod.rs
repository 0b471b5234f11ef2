//! Process transports consumed by the expect engine
//!
//! A transport is the byte-level connection to a child process: something
//! that can be read from, written to, polled for liveness and closed. The
//! engine never spawns processes or touches OS handles itself; it only talks
//! to a [`Transport`].
//!
//! Two implementations ship with the crate:
//!
//! - [`PtyTransport`]: a child attached to a native pseudo-terminal on Unix or
//!   a ConPTY pseudo-console on Windows, via `portable-pty`
//! - [`MemoryTransport`]: an in-process stand-in whose "process side" is
//!   driven through a [`MemoryPeer`], for tests and embedding

mod memory;
mod pty;

pub use memory::{MemoryPeer, MemoryTransport};
pub use pty::PtyTransport;

use std::io;

/// Byte-level connection to a child process.
///
/// Implementations must be usable from several tasks at once (the reader loop
/// reads while the caller writes), hence `&self` everywhere.
pub trait Transport: Send + Sync {
    /// Return up to `max_bytes` of pending output.
    ///
    /// Must return promptly: an empty vector means "nothing right now", not
    /// end of stream. End of stream is signalled by [`Transport::is_alive`].
    fn read(&self, max_bytes: usize) -> io::Result<Vec<u8>>;

    /// Write `data` to the process input. May block until written.
    fn write(&self, data: &[u8]) -> io::Result<()>;

    /// Whether the process is still running.
    fn is_alive(&self) -> bool;

    /// Terminate the process and release its handles. Idempotent.
    fn close(&self) -> io::Result<()>;

    /// Exit code of the process once it has ended, if known.
    fn exit_code(&self) -> Option<u32> {
        None
    }
}

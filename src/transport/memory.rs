//! In-memory transport

use super::Transport;
use bytes::BytesMut;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct State {
    output: BytesMut,
    input: Vec<u8>,
    alive: bool,
    closed: bool,
    exit_code: Option<u32>,
    max_chunk: Option<usize>,
}

/// Transport whose process side lives in memory.
///
/// Created together with a [`MemoryPeer`], which plays the child process:
/// whatever the peer emits becomes readable output, whatever the session
/// writes can be collected from the peer.
///
/// # Examples
///
/// ```
/// use ptyexpect::transport::{MemoryTransport, Transport};
///
/// let (transport, peer) = MemoryTransport::pair();
/// peer.emit("hello");
/// assert_eq!(transport.read(64).unwrap(), b"hello");
///
/// transport.write(b"input").unwrap();
/// assert_eq!(peer.take_input(), b"input");
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
}

/// Process side of a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    state: Arc<Mutex<State>>,
}

impl MemoryTransport {
    /// Create a live transport and its process side.
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let state = Arc::new(Mutex::new(State {
            output: BytesMut::new(),
            input: Vec::new(),
            alive: true,
            closed: false,
            exit_code: None,
            max_chunk: None,
        }));
        (
            MemoryTransport {
                state: Arc::clone(&state),
            },
            MemoryPeer { state },
        )
    }
}

impl MemoryPeer {
    /// Make `data` available as process output.
    pub fn emit(&self, data: impl AsRef<[u8]>) {
        lock(&self.state).output.extend_from_slice(data.as_ref());
    }

    /// Everything written to the process so far, clearing it.
    pub fn take_input(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.state).input)
    }

    /// Cap how many bytes a single read returns, to simulate fragmented output.
    pub fn set_max_chunk(&self, max: usize) {
        lock(&self.state).max_chunk = Some(max.max(1));
    }

    /// End the process with exit code 0.
    pub fn exit(&self) {
        self.exit_with(0);
    }

    /// End the process with `code`. Output already emitted stays readable.
    pub fn exit_with(&self, code: u32) {
        let mut state = lock(&self.state);
        state.alive = false;
        state.exit_code = Some(code);
    }

    /// Whether the session side has closed the transport.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

impl Transport for MemoryTransport {
    fn read(&self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut state = lock(&self.state);
        let limit = state.max_chunk.map_or(max_bytes, |chunk| chunk.min(max_bytes));
        let n = limit.min(state.output.len());
        Ok(state.output.split_to(n).to_vec())
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        if state.closed || !state.alive {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "process is not running",
            ));
        }
        state.input.extend_from_slice(data);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        let state = lock(&self.state);
        state.alive && !state.closed
    }

    fn close(&self) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.closed = true;
        state.alive = false;
        Ok(())
    }

    fn exit_code(&self) -> Option<u32> {
        lock(&self.state).exit_code
    }
}

// A panic while holding this lock leaves plain data behind, so keep going
fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

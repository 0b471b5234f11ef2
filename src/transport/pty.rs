//! Pseudo-terminal transport backed by `portable-pty`

use super::Transport;
use crate::result::ExpectError;
use bytes::BytesMut;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Size of a single blocking read from the PTY master
const PUMP_CHUNK: usize = 4096;

/// Back-off when the PTY master reports `WouldBlock`
const PUMP_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Output received from the PTY but not yet handed to the reader loop
struct Incoming {
    rx: Receiver<Vec<u8>>,
    pending: BytesMut,
}

struct ChildState {
    child: Box<dyn Child + Send + Sync>,
    exit_code: Option<u32>,
}

/// A child process attached to a pseudo-terminal.
///
/// Reads from a PTY master block, so a dedicated thread pumps the master into
/// a channel and [`Transport::read`] only ever drains that channel. This keeps
/// the read side of the transport non-blocking on every platform.
///
/// # Limitations
///
/// [`Transport::close`] kills the spawned process only, not its descendants.
/// A background grandchild that keeps the PTY open (`sh -c 'sleep 100 &'`)
/// survives the close, and the pump thread stays parked in `read` until that
/// grandchild exits. `close` itself never waits on the pump.
pub struct PtyTransport {
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    child: Mutex<ChildState>,
    incoming: Mutex<Incoming>,
    closed: AtomicBool,
}

impl PtyTransport {
    /// Spawn `argv` attached to a new PTY of the given size.
    ///
    /// The child inherits the caller's environment plus `env`, and starts in
    /// `cwd` (the caller's working directory when `None`).
    pub fn spawn(
        argv: &[String],
        size: PtySize,
        cwd: Option<PathBuf>,
        env: &[(String, String)],
    ) -> Result<Self, ExpectError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ExpectError::SpawnError("Empty command".to_string()))?;

        let pty_pair = native_pty_system()
            .openpty(size)
            .map_err(|e| ExpectError::PtyError(e.to_string()))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        if let Some(dir) = cwd.or_else(|| std::env::current_dir().ok()) {
            cmd.cwd(dir);
        }
        for (key, value) in env {
            cmd.env(key, value);
        }

        let child = pty_pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ExpectError::SpawnError(e.to_string()))?;

        // The master only sees EOF once no slave handle is left open
        drop(pty_pair.slave);

        let reader = pty_pair
            .master
            .try_clone_reader()
            .map_err(|e| ExpectError::PtyError(e.to_string()))?;
        let writer = pty_pair
            .master
            .take_writer()
            .map_err(|e| ExpectError::PtyError(e.to_string()))?;

        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("ptyexpect-pump".to_string())
            .spawn(move || pump(reader, tx))?;

        tracing::info!(program = %program, pid = ?child.process_id(), "spawned PTY process");

        Ok(Self {
            master: Mutex::new(Some(pty_pair.master)),
            writer: Mutex::new(Some(writer)),
            child: Mutex::new(ChildState {
                child,
                exit_code: None,
            }),
            incoming: Mutex::new(Incoming {
                rx,
                pending: BytesMut::new(),
            }),
            closed: AtomicBool::new(false),
        })
    }

    fn poll_exit(state: &mut ChildState) -> bool {
        if state.exit_code.is_some() {
            return false;
        }
        match state.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(exit_code = status.exit_code(), "PTY process exited");
                state.exit_code = Some(status.exit_code());
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to poll PTY process");
                false
            }
        }
    }
}

impl Transport for PtyTransport {
    fn read(&self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut incoming = lock(&self.incoming)?;
        let Incoming { rx, pending } = &mut *incoming;

        while pending.len() < max_bytes {
            match rx.try_recv() {
                Ok(chunk) => pending.extend_from_slice(&chunk),
                Err(_) => break,
            }
        }

        let n = max_bytes.min(pending.len());
        Ok(pending.split_to(n).to_vec())
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = lock(&self.writer)?;
        let writer = writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "PTY is closed"))?;
        writer.write_all(data)?;
        writer.flush()
    }

    fn is_alive(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        match self.child.lock() {
            Ok(mut state) => Self::poll_exit(&mut state),
            Err(_) => false,
        }
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Only the direct child is killed; the pump is left to finish on its own

        {
            let mut state = lock(&self.child)?;
            if Self::poll_exit(&mut state) {
                if let Err(e) = state.child.kill() {
                    tracing::debug!(error = %e, "kill failed, process may already be gone");
                }
                Self::poll_exit(&mut state);
            }
        }

        lock(&self.writer)?.take();
        lock(&self.master)?.take();
        tracing::info!("PTY transport closed");
        Ok(())
    }

    fn exit_code(&self) -> Option<u32> {
        let mut state = self.child.lock().ok()?;
        Self::poll_exit(&mut state);
        state.exit_code
    }
}

impl Drop for PtyTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Copy PTY master output into the channel until EOF or error.
fn pump(mut reader: Box<dyn Read + Send>, tx: Sender<Vec<u8>>) {
    let mut buf = [0u8; PUMP_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(PUMP_RETRY_DELAY);
            }
            // Linux reports EIO once the slave side is gone
            Err(_) => break,
        }
    }
    tracing::debug!("PTY pump finished");
}

fn lock<T>(mutex: &Mutex<T>) -> io::Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| io::Error::other("PTY transport lock poisoned"))
}

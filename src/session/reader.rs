//! Background task moving transport output into the session buffer

use super::{SessionState, Shared};
use crate::result::ExpectError;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Pause between reads while the process is quiet
const IDLE_DELAY: Duration = Duration::from_millis(1);

/// Start the reader loop for `shared` on the current tokio runtime.
pub(crate) fn start(shared: Arc<Shared>) -> Result<JoinHandle<()>, ExpectError> {
    let runtime = Handle::try_current()
        .map_err(|e| ExpectError::SpawnError(format!("a tokio runtime is required: {e}")))?;
    Ok(runtime.spawn(run(shared)))
}

async fn run(shared: Arc<Shared>) {
    shared.state.send_if_modified(|state| {
        let first = *state == SessionState::Created;
        if first {
            *state = SessionState::Running;
        }
        first
    });
    tracing::debug!("reader loop started");

    loop {
        match pull(&shared).await {
            Ok(true) => {
                tokio::task::yield_now().await;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "transport read failed, stopping reader");
                break;
            }
        }

        if !shared.transport.is_alive() {
            // Let bytes still in flight land before declaring the end
            tokio::time::sleep(shared.config.eof_grace).await;
            while let Ok(true) = pull(&shared).await {}
            break;
        }

        tokio::time::sleep(IDLE_DELAY).await;
    }

    shared.state.send_if_modified(|state| {
        let ended = *state != SessionState::Closed;
        if ended {
            *state = SessionState::Ended;
        }
        ended
    });
    tracing::debug!("reader loop finished");
}

/// Move one chunk from the transport into the buffer.
///
/// Returns whether any bytes arrived. The buffer lock is only taken once the
/// read has returned.
async fn pull(shared: &Shared) -> io::Result<bool> {
    let chunk = shared.transport.read(shared.config.read_chunk)?;
    if chunk.is_empty() {
        return Ok(false);
    }
    shared.buffer.lock().await.append(&chunk);
    Ok(true)
}

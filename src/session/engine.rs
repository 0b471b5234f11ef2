//! The expect loop: deadline-bounded polling of the session buffer

use super::{SessionState, Shared};
use crate::buffer::OutputBuffer;
use crate::pattern::{self, Pattern};
use crate::result::{ExpectError, MatchResult, PatternError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Roughly thirty years; stands in for "no deadline" without overflowing
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Wait until one of `patterns` is satisfied or `timeout` passes.
///
/// Each pass checks, in order: session closed, deadline, process liveness,
/// then the text patterns against the whole buffer. Scanning and consuming
/// happen under one buffer lock with no suspension point in between, so
/// dropping this future never leaves a half-applied match behind.
pub(crate) async fn expect(
    shared: &Shared,
    patterns: &[Pattern],
    timeout: Duration,
) -> Result<MatchResult, ExpectError> {
    if patterns.is_empty() {
        return Err(PatternError::EmptyPatternList.into());
    }

    let start = Instant::now();
    let deadline = start.checked_add(timeout).unwrap_or(start + FAR_FUTURE);
    let mut state = shared.state.subscribe();

    loop {
        if *state.borrow_and_update() == SessionState::Closed {
            return Err(ExpectError::SessionClosed);
        }

        let now = Instant::now();
        if now >= deadline {
            let buffer = shared.buffer.lock().await;
            tracing::debug!(?timeout, buffered = buffer.len(), "expect timed out");
            return Err(ExpectError::Timeout {
                duration: timeout,
                snapshot: buffer.snapshot(shared.config.snapshot_limit),
            });
        }

        if !shared.transport.is_alive() {
            return finish_at_eof(shared, patterns, &mut state).await;
        }

        {
            let mut buffer = shared.buffer.lock().await;
            if let Some(result) = consume_first_match(&mut buffer, patterns) {
                tracing::debug!(
                    pattern_index = result.pattern_index,
                    elapsed = ?start.elapsed(),
                    "pattern matched"
                );
                return Ok(result);
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(shared.config.poll_interval.min(remaining)).await;
    }
}

/// Resolve a call once the process is gone.
///
/// Residual output can still satisfy a text pattern; failing that, an `Eof`
/// pattern takes the whole buffer, and without one the call fails.
///
/// The wait for final output is not cut short by the call's deadline, so
/// the handoff always covers everything the process wrote.
async fn finish_at_eof(
    shared: &Shared,
    patterns: &[Pattern],
    state: &mut watch::Receiver<SessionState>,
) -> Result<MatchResult, ExpectError> {
    // The reader loop publishes `Ended` after its own grace pause and final drain
    let grace = shared.config.eof_grace * 2;
    let _ = tokio::time::timeout(grace, state.wait_for(|s| s.is_finished())).await;

    if *state.borrow() == SessionState::Closed {
        return Err(ExpectError::SessionClosed);
    }

    let mut buffer = shared.buffer.lock().await;
    if let Some(result) = consume_first_match(&mut buffer, patterns) {
        tracing::debug!(pattern_index = result.pattern_index, "pattern matched residual output");
        return Ok(result);
    }

    if let Some(pattern_index) = pattern::eof_index(patterns) {
        let before = buffer.take_all();
        tracing::debug!(pattern_index, buffered = before.len(), "matched end of stream");
        return Ok(MatchResult {
            pattern_index,
            before: String::from_utf8_lossy(&before).into_owned(),
            matched: String::new(),
            captures: vec![],
        });
    }

    tracing::debug!(buffered = buffer.len(), "process ended without a match");
    Err(ExpectError::EndOfStream {
        snapshot: buffer.snapshot(shared.config.snapshot_limit),
    })
}

/// Scan `buffer` and consume the winning match, if any.
pub(crate) fn consume_first_match(
    buffer: &mut OutputBuffer,
    patterns: &[Pattern],
) -> Option<MatchResult> {
    let (pattern_index, m) = pattern::scan(patterns, buffer.as_bytes())?;
    let (before, matched) = buffer.consume(&m);
    Some(MatchResult {
        pattern_index,
        before: String::from_utf8_lossy(&before).into_owned(),
        matched: String::from_utf8_lossy(&matched).into_owned(),
        captures: m.captures,
    })
}

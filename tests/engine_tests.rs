//! Expect engine behavior against an in-memory process

use ptyexpect::transport::{MemoryPeer, MemoryTransport};
use ptyexpect::{CallGuard, ExpectError, GuardStrategy, Pattern, PatternError, Session, SessionState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

fn memory_session() -> (Session, MemoryPeer) {
    let (transport, peer) = MemoryTransport::pair();
    let session = Session::builder()
        .timeout(Duration::from_secs(2))
        .eof_grace(Duration::from_millis(20))
        .attach(transport)
        .expect("Failed to attach");
    (session, peer)
}

/// Wait until the reader loop has buffered `expected`.
async fn buffered(session: &Session, expected: &str) {
    let start = Instant::now();
    while session.pending().await != expected {
        assert!(start.elapsed() < Duration::from_secs(2), "reader never caught up");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn test_prompt_then_end_of_stream() {
    let (session, peer) = memory_session();
    peer.emit("booting...\nready\n");

    let result = session.expect(Pattern::exact("ready")).await.unwrap();
    assert_eq!(result.pattern_index, 0);
    assert_eq!(result.before, "booting...\n");
    assert_eq!(result.matched, "ready");

    peer.exit();
    let result = session.expect(Pattern::Eof).await.unwrap();
    assert_eq!(result.before, "\n");
    assert!(result.matched.is_empty());
    assert!(result.captures.is_empty());
}

#[tokio::test]
async fn test_silent_process_times_out() {
    let (session, _peer) = memory_session();

    let start = Instant::now();
    let err = session
        .expect_timeout(&[Pattern::exact("ready")], Duration::from_millis(100))
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, ExpectError::Timeout { duration, .. } if duration == Duration::from_millis(100)));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(600));
}

#[tokio::test]
async fn test_timeout_reports_buffered_tail() {
    let (transport, peer) = MemoryTransport::pair();
    let session = Session::builder()
        .snapshot_limit(5)
        .attach(transport)
        .unwrap();
    peer.emit("0123456789");

    let err = session
        .expect_timeout(&[Pattern::exact("never")], Duration::from_millis(50))
        .await
        .unwrap_err();

    match err {
        ExpectError::Timeout { snapshot, .. } => assert_eq!(snapshot, "56789"),
        e => panic!("Unexpected error: {}", e),
    }
    // A failed call consumes nothing
    assert_eq!(session.pending().await, "0123456789");
}

#[tokio::test]
async fn test_zero_timeout_fails_immediately() {
    let (session, peer) = memory_session();
    peer.emit("ready");
    buffered(&session, "ready").await;

    let err = session
        .expect_timeout(&[Pattern::exact("ready")], Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectError::Timeout { .. }));
}

#[tokio::test]
async fn test_silent_exit_matches_eof() {
    let (session, peer) = memory_session();
    peer.exit();

    let result = session.expect(Pattern::Eof).await.unwrap();
    assert_eq!(result.pattern_index, 0);
    assert_eq!(result.before, "");
}

#[tokio::test]
async fn test_eof_takes_whole_buffer() {
    let (session, peer) = memory_session();
    peer.emit("last words\n");
    peer.exit();

    let patterns = [Pattern::exact("never"), Pattern::Eof];
    let result = session.expect_any(&patterns).await.unwrap();

    assert_eq!(result.pattern_index, 1);
    assert_eq!(result.before, "last words\n");
    assert_eq!(session.pending().await, "");
}

#[tokio::test]
async fn test_residual_output_beats_eof() {
    let (session, peer) = memory_session();
    peer.emit("status=17\n");
    peer.exit();

    let patterns = [Pattern::regex(r"status=(\d+)").unwrap(), Pattern::Eof];
    let result = session.expect_any(&patterns).await.unwrap();

    assert_eq!(result.pattern_index, 0);
    assert_eq!(result.captures[1], "17");

    // The remainder still ends in EOF
    let result = session.expect_any(&patterns).await.unwrap();
    assert_eq!(result.pattern_index, 1);
    assert_eq!(result.before, "\n");
}

#[tokio::test]
async fn test_end_of_stream_without_eof_pattern() {
    let (session, peer) = memory_session();
    peer.emit("goodbye");
    peer.exit_with(1);

    let err = session.expect(Pattern::exact("never")).await.unwrap_err();
    match err {
        ExpectError::EndOfStream { snapshot } => assert_eq!(snapshot, "goodbye"),
        e => panic!("Unexpected error: {}", e),
    }

    // Output is kept for a later Eof or read
    assert_eq!(session.pending().await, "goodbye");
    assert_eq!(session.exit_code(), Some(1));
}

#[tokio::test]
async fn test_lowest_index_wins() {
    let (session, peer) = memory_session();
    peer.emit("beta alpha");
    buffered(&session, "beta alpha").await;

    let patterns = [Pattern::exact("alpha"), Pattern::exact("beta")];
    let result = session.expect_any(&patterns).await.unwrap();

    // Index 0 wins even though index 1 matches earlier in the output
    assert_eq!(result.pattern_index, 0);
    assert_eq!(result.before, "beta ");
    assert_eq!(session.pending().await, "");
}

#[tokio::test]
async fn test_fragmented_echo_is_matched() {
    let (session, peer) = memory_session();
    peer.set_max_chunk(1);

    session.send_line("hello world").await.unwrap();
    let input = peer.take_input();
    assert!(input.starts_with(b"hello world"));
    assert!(input.ends_with(b"\n"));

    // Echo it back one byte per read
    peer.emit(&input);
    let result = session.expect(Pattern::exact("hello world")).await.unwrap();
    assert_eq!(result.before, "");
}

#[tokio::test]
async fn test_successive_prompts() {
    let (session, peer) = memory_session();
    peer.emit("one> two> ");

    let first = session.expect(Pattern::exact("> ")).await.unwrap();
    assert_eq!(first.before, "one");

    let second = session.expect(Pattern::exact("> ")).await.unwrap();
    assert_eq!(second.before, "two");

    let err = session
        .expect_timeout(&[Pattern::exact("> ")], Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectError::Timeout { .. }));
}

#[tokio::test]
async fn test_output_arriving_mid_call() {
    let (session, peer) = memory_session();

    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        peer.emit("$ ");
        peer
    });

    let result = session.expect(Pattern::regex(r"\$ $").unwrap()).await.unwrap();
    assert_eq!(result.matched, "$ ");
    let _peer = writer.await.unwrap();
}

#[tokio::test]
async fn test_empty_pattern_list() {
    let (session, _peer) = memory_session();
    let err = session.expect_any(&[]).await.unwrap_err();
    assert!(matches!(
        err,
        ExpectError::InvalidPattern(PatternError::EmptyPatternList)
    ));
}

#[tokio::test]
async fn test_empty_exact_matches_immediately() {
    let (session, _peer) = memory_session();
    let result = session.expect(Pattern::exact("")).await.unwrap();
    assert_eq!(result.before, "");
    assert_eq!(result.matched, "");
}

#[tokio::test]
async fn test_timeout_marker_does_not_suppress_error() {
    let (session, _peer) = memory_session();
    let err = session
        .expect_timeout(&[Pattern::Timeout], Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectError::Timeout { .. }));
}

#[tokio::test]
async fn test_read_drains_without_waiting() {
    let (session, peer) = memory_session();
    assert_eq!(session.read(None).await.unwrap(), "");

    peer.emit("abcdef");
    buffered(&session, "abcdef").await;

    assert_eq!(session.read(Some(2)).await.unwrap(), "ab");
    assert_eq!(session.read(None).await.unwrap(), "cdef");
    assert_eq!(session.read(None).await.unwrap(), "");
}

#[tokio::test]
async fn test_lifecycle_states() {
    let (session, peer) = memory_session();
    assert!(session.is_alive().unwrap());
    assert_eq!(session.exit_code(), None);

    peer.exit_with(3);
    session.expect(Pattern::Eof).await.unwrap();

    assert_eq!(session.state(), SessionState::Ended);
    assert!(!session.is_alive().unwrap());
    assert_eq!(session.exit_code(), Some(3));

    // Writing to a finished process is an I/O error, not a closed session
    let err = assert_err!(session.send_line("late").await);
    assert!(matches!(err, ExpectError::IoError(_)));

    assert_ok!(session.close().await);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_closed_session_rejects_everything() {
    let (session, peer) = memory_session();

    assert_ok!(session.close().await);
    assert_ok!(session.close().await);

    assert!(peer.is_closed());
    assert!(matches!(session.is_alive(), Err(ExpectError::SessionClosed)));
    assert!(matches!(
        session.expect(Pattern::Eof).await,
        Err(ExpectError::SessionClosed)
    ));
    assert!(matches!(
        session.send(b"x").await,
        Err(ExpectError::SessionClosed)
    ));
    assert!(matches!(
        session.read(None).await,
        Err(ExpectError::SessionClosed)
    ));
}

#[tokio::test]
async fn test_close_during_expect() {
    let (session, _peer) = memory_session();
    let session = Arc::new(session);

    let waiting = Arc::clone(&session);
    let call = tokio::spawn(async move {
        waiting
            .expect_timeout(&[Pattern::exact("never")], Duration::from_secs(10))
            .await
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    session.close().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), call)
        .await
        .expect("expect call did not notice the close")
        .unwrap();
    assert!(matches!(result, Err(ExpectError::SessionClosed)));
}

#[tokio::test]
async fn test_interrupted_call_keeps_buffer() {
    let (session, peer) = memory_session();
    peer.emit("partial output");
    buffered(&session, "partial output").await;

    let guard = CallGuard::new(Duration::from_millis(50));
    let err = guard
        .interrupt(session.expect_timeout(&[Pattern::exact("never")], Duration::from_secs(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectError::Interrupted { .. }));

    // Still usable, nothing consumed
    assert_eq!(session.pending().await, "partial output");
    peer.emit(" done");
    let result = session.expect(Pattern::exact("done")).await.unwrap();
    assert_eq!(result.before, "partial output ");
}

#[tokio::test]
async fn test_detached_call_can_still_consume() {
    let (session, peer) = memory_session();
    let session = Arc::new(session);

    let guard = CallGuard::new(Duration::from_millis(30)).strategy(GuardStrategy::Detached);
    let waiting = Arc::clone(&session);
    let err = guard
        .run(async move { waiting.expect(Pattern::exact("late")).await })
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectError::Interrupted { .. }));

    // The abandoned call is still running and takes the match
    peer.emit("too late, and more");
    buffered(&session, ", and more").await;
}

#[tokio::test]
async fn test_eof_near_deadline_waits_for_final_output() {
    let (transport, peer) = MemoryTransport::pair();
    let session = Session::builder()
        .eof_grace(Duration::from_millis(50))
        .attach(transport)
        .unwrap();

    let child = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        peer.exit();
        // Lands while the reader is still in its grace pause
        tokio::time::sleep(Duration::from_millis(10)).await;
        peer.emit("final output");
    });

    // The deadline falls well inside the grace pause
    let result = session
        .expect_timeout(&[Pattern::Eof], Duration::from_millis(30))
        .await
        .unwrap();
    child.await.unwrap();

    assert_eq!(result.before, "final output");
    assert_eq!(session.pending().await, "");
    assert_eq!(session.state(), SessionState::Ended);
}

//! Hard wall-clock limits around whole calls
//!
//! An expect call enforces its own deadline cooperatively. A caller that
//! runs a longer script of calls (send, expect, send, ...) can additionally
//! put a hard limit on the whole thing with a [`CallGuard`].
//!
//! Two strategies are offered:
//!
//! - [`GuardStrategy::Interrupt`] drops the guarded future when the limit
//!   passes, unwinding it at whatever suspension point it is parked on.
//! - [`GuardStrategy::Detached`] runs the guarded future as its own task and
//!   stops waiting for it at the limit; the task is abandoned and carries on
//!   in the background.
//!
//! Both are safe for a session: a match is scanned and consumed under a
//! single buffer lock without suspending in between, so neither an unwound
//! nor an orphaned expect call can leave the buffer half-consumed, and the
//! reader loop keeps running regardless.

use crate::result::ExpectError;
use std::future::Future;
use std::time::Duration;

/// Default hard limit (in seconds)
pub const DEFAULT_LIMIT_SECS: u64 = 12;

/// How much earlier than the hard limit the soft expect timeout should fire
const BUDGET_MARGIN: Duration = Duration::from_secs(2);

/// Upper bound for a derived expect timeout
const MAX_EXPECT_BUDGET: Duration = Duration::from_secs(10);

/// Derived expect timeout when the hard limit leaves no room for the margin
const MIN_EXPECT_BUDGET: Duration = Duration::from_secs(1);

/// How a [`CallGuard`] cuts off a call that runs too long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardStrategy {
    /// Drop the call's future at the limit.
    #[default]
    Interrupt,
    /// Run the call on its own task and abandon it at the limit.
    Detached,
}

/// A hard time limit for a call.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{CallGuard, Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let guard = CallGuard::new(Duration::from_secs(12));
/// let session = Session::spawn("python3 -i")?;
///
/// // Soft deadline for each expect, 2 seconds inside the hard limit
/// session.set_timeout(guard.expect_budget());
///
/// guard
///     .interrupt(async {
///         session.expect(Pattern::exact(">>>")).await?;
///         session.send_line("print(6 * 7)").await?;
///         session.expect(Pattern::exact("42")).await
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallGuard {
    limit: Duration,
    strategy: GuardStrategy,
}

impl Default for CallGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_LIMIT_SECS))
    }
}

impl CallGuard {
    /// Guard with the given hard limit and the interrupt strategy.
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            strategy: GuardStrategy::Interrupt,
        }
    }

    /// Use `strategy` instead of the default.
    pub fn strategy(mut self, strategy: GuardStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The hard limit.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Soft timeout to give individual expect calls under this guard.
    ///
    /// Two seconds short of the limit and at most ten seconds, so an expect
    /// normally fails with a descriptive timeout before the guard cuts in.
    /// Limits of two seconds or less get a one-second budget.
    pub fn expect_budget(&self) -> Duration {
        if self.limit > BUDGET_MARGIN {
            (self.limit - BUDGET_MARGIN).min(MAX_EXPECT_BUDGET)
        } else {
            MIN_EXPECT_BUDGET
        }
    }

    /// Run `call` under the limit using the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Interrupted`] when the limit passes first,
    /// otherwise whatever `call` returned.
    pub async fn run<F, T>(&self, call: F) -> Result<T, ExpectError>
    where
        F: Future<Output = Result<T, ExpectError>> + Send + 'static,
        T: Send + 'static,
    {
        match self.strategy {
            GuardStrategy::Interrupt => self.interrupt(call).await,
            GuardStrategy::Detached => self.detach(call).await,
        }
    }

    /// Run `call`, dropping it if the limit passes.
    ///
    /// Unlike [`CallGuard::run`] the call may borrow from the caller.
    pub async fn interrupt<F, T>(&self, call: F) -> Result<T, ExpectError>
    where
        F: Future<Output = Result<T, ExpectError>>,
    {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(limit = ?self.limit, "call interrupted");
                Err(ExpectError::Interrupted { limit: self.limit })
            }
        }
    }

    async fn detach<F, T>(&self, call: F) -> Result<T, ExpectError>
    where
        F: Future<Output = Result<T, ExpectError>> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::spawn(call);
        match tokio::time::timeout(self.limit, task).await {
            Ok(joined) => joined.map_err(|e| ExpectError::IoError(std::io::Error::other(e)))?,
            Err(_) => {
                // Dropping the JoinHandle detaches the task; it keeps running
                tracing::warn!(limit = ?self.limit, "call abandoned past its limit");
                Err(ExpectError::Interrupted { limit: self.limit })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_expect_budget() {
        let budget = |secs| CallGuard::new(Duration::from_secs(secs)).expect_budget();
        assert_eq!(budget(12), Duration::from_secs(10));
        assert_eq!(budget(30), Duration::from_secs(10));
        assert_eq!(budget(5), Duration::from_secs(3));
        assert_eq!(budget(2), Duration::from_secs(1));
        assert_eq!(budget(0), Duration::from_secs(1));
    }

    #[test]
    fn test_default_guard() {
        let guard = CallGuard::default();
        assert_eq!(guard.limit(), Duration::from_secs(12));
        assert_eq!(guard.strategy, GuardStrategy::Interrupt);
    }

    #[tokio::test]
    async fn test_interrupt_passes_result_through() {
        let guard = CallGuard::new(Duration::from_secs(1));
        let value = guard.interrupt(async { Ok::<_, ExpectError>(7) }).await.unwrap();
        assert_eq!(value, 7);

        let err = guard
            .interrupt(async { Err::<(), _>(ExpectError::SessionClosed) })
            .await
            .unwrap_err();
        assert!(matches!(err, ExpectError::SessionClosed));
    }

    #[tokio::test]
    async fn test_interrupt_cuts_off_slow_call() {
        let guard = CallGuard::new(Duration::from_millis(50));
        let err = guard
            .interrupt(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ExpectError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExpectError::Interrupted { limit } if limit == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_detached_call_keeps_running() {
        let guard = CallGuard::new(Duration::from_millis(50)).strategy(GuardStrategy::Detached);
        let finished = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&finished);
        let err = guard
            .run(async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, ExpectError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExpectError::Interrupted { .. }));
        assert!(!finished.load(Ordering::SeqCst));

        // The abandoned task is not cancelled
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_detached_returns_result_in_time() {
        let guard = CallGuard::new(Duration::from_secs(1)).strategy(GuardStrategy::Detached);
        let value = guard.run(async { Ok::<_, ExpectError>("done") }).await.unwrap();
        assert_eq!(value, "done");
    }
}

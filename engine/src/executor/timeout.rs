// File: engine/src/executor/timeout.rs
//
// Timeout Execution Context
//
// Strategy objects that run a unit of work with a deadline. The executor only
// depends on the trait, so a target can choose between dropping the work on
// expiry and letting it finish in the background.

use crate::error::{join_error, TestError};
use crate::orchestrator::Clock;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// Work handed to a timeout context
pub type TimedWork = BoxFuture<'static, Result<(), TestError>>;

/// Runs work with a best-effort timeout
///
/// Implementations must return the work's own outcome untouched when it
/// finishes in time, and `Err(TestError::Timeout(timeout))` otherwise.
#[async_trait]
pub trait TimeoutExecutionContext: Send + Sync {
    async fn execute_with_timeout_interruption(&self, timeout: Duration, work: TimedWork) -> Result<(), TestError>;
}

/// Drops the work when the deadline passes
///
/// Dropping a future cancels it at its next suspension point, which is the
/// closest async Rust gets to interrupting a thread.
pub struct InterruptingTimeoutContext {
    clock: Arc<dyn Clock>,
}

impl InterruptingTimeoutContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl TimeoutExecutionContext for InterruptingTimeoutContext {
    async fn execute_with_timeout_interruption(&self, timeout: Duration, work: TimedWork) -> Result<(), TestError> {
        tokio::select! {
            outcome = work => outcome,
            _ = self.clock.sleep(timeout) => Err(TestError::Timeout(timeout)),
        }
    }
}

/// Runs the work on its own task and stops waiting when the deadline passes
///
/// The timed-out task is not cancelled: it keeps running in the background
/// until it completes. Use this when work must not be torn down mid-way.
pub struct DetachedTimeoutContext {
    clock: Arc<dyn Clock>,
}

impl DetachedTimeoutContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl TimeoutExecutionContext for DetachedTimeoutContext {
    async fn execute_with_timeout_interruption(&self, timeout: Duration, work: TimedWork) -> Result<(), TestError> {
        let handle = tokio::spawn(work);
        tokio::select! {
            joined = handle => joined.unwrap_or_else(|e| Err(join_error(e))),
            _ = self.clock.sleep(timeout) => {
                if log::log_enabled!(log::Level::Warn) {
                    log::warn!(
                        "[TIMEOUT] Work exceeded {}ms and keeps running in the background",
                        timeout.as_millis()
                    );
                }
                Err(TestError::Timeout(timeout))
            }
        }
    }
}

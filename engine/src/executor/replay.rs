// File: engine/src/executor/replay.rs
//
// Invocation Replay
//
// Runs a test body `invocations` times with up to `threads` runs in flight,
// wrapping every run in its before/after-invocation hooks and its own
// per-invocation timeout. The aggregated outcome is the error of the lowest
// failing invocation index, independent of completion order.

use super::timeout::TimeoutExecutionContext;
use crate::error::{catch_panic, TestError};
use crate::test_case::hooks::{invoke_after_invocation, invoke_before_invocation};
use crate::test_case::{TestCase, TestContext};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Repeat plan for one test execution
pub(crate) struct Replay {
    pub(crate) invocations: usize,
    pub(crate) threads: usize,
    pub(crate) invocation_timeout: Duration,
    pub(crate) timeout_context: Arc<dyn TimeoutExecutionContext>,
}

impl Replay {
    /// Run every invocation and return the aggregated outcome
    pub(crate) async fn run(&self, test_case: TestCase, context: TestContext) -> Result<(), TestError> {
        if self.threads <= 1 || self.invocations <= 1 {
            self.run_sequential(test_case, context).await
        } else {
            self.run_concurrent(test_case, context).await
        }
    }

    async fn run_sequential(&self, test_case: TestCase, context: TestContext) -> Result<(), TestError> {
        let mut first = Ok(());
        for invocation in 0..self.invocations {
            let outcome = run_invocation(
                test_case.clone(),
                context.for_invocation(invocation),
                invocation,
                self.invocation_timeout,
                self.timeout_context.clone(),
            )
            .await;
            if first.is_ok() {
                first = outcome;
            }
        }
        first
    }

    async fn run_concurrent(&self, test_case: TestCase, context: TestContext) -> Result<(), TestError> {
        let width = self.threads.min(self.invocations);

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "[REPLAY] Running {} invocations of {} with concurrency {}",
                self.invocations,
                test_case.path(),
                width
            );
        }

        let semaphore = Arc::new(Semaphore::new(width));
        let mut join_set = JoinSet::new();

        for invocation in 0..self.invocations {
            let semaphore = semaphore.clone();
            let test_case = test_case.clone();
            let context = context.for_invocation(invocation);
            let invocation_timeout = self.invocation_timeout;
            let timeout_context = self.timeout_context.clone();

            join_set.spawn(async move {
                // Hold the permit for the whole invocation, hooks included
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        run_invocation(test_case, context, invocation, invocation_timeout, timeout_context)
                            .await
                    }
                    Err(_) => Err(TestError::Cancelled),
                };
                (invocation, outcome)
            });
        }

        let mut indexed = Vec::with_capacity(self.invocations);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(entry) => indexed.push(entry),
                Err(e) => {
                    if log::log_enabled!(log::Level::Error) {
                        log::error!("[REPLAY] Invocation task join error: {:?}", e);
                    }
                    indexed.push((usize::MAX, Err(crate::error::join_error(e))));
                }
            }
        }

        indexed.sort_by_key(|(invocation, _)| *invocation);
        indexed
            .into_iter()
            .map(|(_, outcome)| outcome)
            .find(Result::is_err)
            .unwrap_or(Ok(()))
    }
}

/// One run of the body between its invocation hooks
///
/// The after-invocation hooks run even when the hooks before or the body
/// fail. Precedence inside one invocation: before hooks, body, after hooks.
async fn run_invocation(
    test_case: TestCase,
    context: TestContext,
    invocation: usize,
    invocation_timeout: Duration,
    timeout_context: Arc<dyn TimeoutExecutionContext>,
) -> Result<(), TestError> {
    if log::log_enabled!(log::Level::Trace) {
        log::trace!("[REPLAY] Invocation {} of {} starting", invocation, test_case.path());
    }

    let before = invoke_before_invocation(&test_case, invocation).await;
    let body = if before.is_ok() {
        let work = catch_panic((test_case.body())(context)).boxed();
        timeout_context
            .execute_with_timeout_interruption(invocation_timeout, work)
            .await
    } else {
        Ok(())
    };
    let after = invoke_after_invocation(&test_case, invocation).await;

    if log::log_enabled!(log::Level::Trace) {
        log::trace!(
            "[REPLAY] Invocation {} of {} done (ok: {})",
            invocation,
            test_case.path(),
            before.is_ok() && body.is_ok() && after.is_ok()
        );
    }

    before.and(body).and(after)
}

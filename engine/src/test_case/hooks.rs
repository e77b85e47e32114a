//! Hooks wrapped around a test and around each of its invocations

use super::{TestCase, TestResult};
use crate::error::{catch_panic, TestError};
use async_trait::async_trait;

/// Lifecycle hook attached to a test case
///
/// Every method has a no-op default, so an implementation only overrides the
/// points it cares about. Hooks run in registration order.
///
/// - `before_test` / `after_test` wrap the whole test (all invocations).
/// - `before_invocation` / `after_invocation` wrap every single run of the
///   body; `invocation` is the zero-based index.
///
/// Errors and panics are captured and turned into the test's result.
#[async_trait]
pub trait TestCaseHook: Send + Sync {
    async fn before_test(&self, _test_case: &TestCase) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_test(&self, _test_case: &TestCase, _result: &TestResult) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_invocation(&self, _test_case: &TestCase, _invocation: usize) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_invocation(&self, _test_case: &TestCase, _invocation: usize) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Run before-test hooks, stopping at the first failure
pub(crate) async fn invoke_before_test(test_case: &TestCase) -> Result<(), TestError> {
    for hook in test_case.hooks() {
        catch_panic(hook.before_test(test_case)).await?;
    }
    Ok(())
}

/// Run every after-test hook; the first failure is reported
pub(crate) async fn invoke_after_test(test_case: &TestCase, result: &TestResult) -> Result<(), TestError> {
    let mut first = Ok(());
    for hook in test_case.hooks() {
        let outcome = catch_panic(hook.after_test(test_case, result)).await;
        if first.is_ok() {
            first = outcome;
        }
    }
    first
}

/// Run before-invocation hooks, stopping at the first failure
pub(crate) async fn invoke_before_invocation(test_case: &TestCase, invocation: usize) -> Result<(), TestError> {
    for hook in test_case.hooks() {
        catch_panic(hook.before_invocation(test_case, invocation)).await?;
    }
    Ok(())
}

/// Run every after-invocation hook; the first failure is reported
pub(crate) async fn invoke_after_invocation(test_case: &TestCase, invocation: usize) -> Result<(), TestError> {
    let mut first = Ok(());
    for hook in test_case.hooks() {
        let outcome = catch_panic(hook.after_invocation(test_case, invocation)).await;
        if first.is_ok() {
            first = outcome;
        }
    }
    first
}

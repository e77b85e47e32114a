//! Retry of failing tests

use super::{Next, TestCaseExtension};
use crate::error::EngineError;
use crate::test_case::{TestCase, TestResult};
use async_trait::async_trait;

/// Re-runs the rest of the chain while the result is a failure or an error
///
/// Every attempt goes through the executor again, so listeners see one
/// `test_started` per attempt and a single `test_finished` with the last
/// result.
pub struct RetryExtension {
    max_retries: usize,
}

impl RetryExtension {
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }
}

#[async_trait]
impl TestCaseExtension for RetryExtension {
    async fn intercept(&self, test_case: TestCase, next: Next<'_>) -> Result<TestResult, EngineError> {
        let mut result = next.run(test_case.clone()).await?;
        let mut attempt = 0;

        while result.is_err() && attempt < self.max_retries {
            attempt += 1;
            if log::log_enabled!(log::Level::Debug) {
                log::debug!(
                    "[RETRY] {} returned {}, retry {}/{}",
                    test_case.path(),
                    result.status(),
                    attempt,
                    self.max_retries
                );
            }
            result = next.run(test_case.clone()).await?;
        }

        Ok(result)
    }
}

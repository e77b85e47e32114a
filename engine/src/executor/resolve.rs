//! Result-priority resolution
//!
//! Outcomes are fed in execution order: before-test hooks, body, after-test
//! hooks. An error may only replace a recorded error from a stage of equal or
//! lower priority, where after-test hooks beat before-test hooks, which beat
//! the body.

use crate::error::TestError;
use crate::test_case::TestResult;
use std::time::Duration;

/// Stage that produced an outcome, ordered by priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Stage {
    Body,
    BeforeTest,
    AfterTest,
}

/// Last known error of a test execution
#[derive(Debug, Default)]
pub(crate) struct Resolution {
    error: Option<(Stage, TestError)>,
}

impl Resolution {
    pub(crate) fn record(&mut self, stage: Stage, outcome: Result<(), TestError>) {
        let Err(error) = outcome else {
            return;
        };
        let replace = match &self.error {
            None => true,
            Some((current, _)) => stage >= *current,
        };
        if replace {
            self.error = Some((stage, error));
        }
    }

    pub(crate) fn outcome(&self) -> Result<(), TestError> {
        match &self.error {
            Some((_, error)) => Err(error.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn to_result(&self, duration: Duration) -> TestResult {
        TestResult::from_outcome(self.outcome(), duration)
    }
}

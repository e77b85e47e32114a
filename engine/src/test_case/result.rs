//! Terminal outcome of one test execution

use crate::error::TestError;
use std::time::Duration;

/// Status of a [`TestResult`], usable as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TestStatus {
    Success,
    Failure,
    Error,
    Ignored,
}

/// Result of executing a test case
///
/// Exactly one result is produced per test case per execution attempt. The
/// duration is wall time measured from the executor's time mark, hooks
/// included.
#[derive(Debug, Clone)]
pub enum TestResult {
    /// Body and hooks completed without error
    Success { duration: Duration },
    /// An assertion failed, something panicked, or the test timed out
    Failure { error: TestError, duration: Duration },
    /// Any other error raised by the body or a hook
    Error { error: TestError, duration: Duration },
    /// The test was not run
    Ignored { reason: Option<String> },
}

impl TestResult {
    pub fn success(duration: Duration) -> Self {
        Self::Success { duration }
    }

    pub fn ignored(reason: Option<String>) -> Self {
        Self::Ignored { reason }
    }

    /// Result for a captured error, classified as failure or error
    pub fn from_error(error: TestError, duration: Duration) -> Self {
        if error.is_failure() {
            Self::Failure { error, duration }
        } else {
            Self::Error { error, duration }
        }
    }

    /// Result for an outcome of hooks or body
    pub fn from_outcome(outcome: Result<(), TestError>, duration: Duration) -> Self {
        match outcome {
            Ok(()) => Self::success(duration),
            Err(error) => Self::from_error(error, duration),
        }
    }

    pub fn status(&self) -> TestStatus {
        match self {
            Self::Success { .. } => TestStatus::Success,
            Self::Failure { .. } => TestStatus::Failure,
            Self::Error { .. } => TestStatus::Error,
            Self::Ignored { .. } => TestStatus::Ignored,
        }
    }

    /// Attached cause, if the result is a failure or an error
    pub fn error(&self) -> Option<&TestError> {
        match self {
            Self::Failure { error, .. } | Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Elapsed time; zero for ignored tests
    pub fn duration(&self) -> Duration {
        match self {
            Self::Success { duration }
            | Self::Failure { duration, .. }
            | Self::Error { duration, .. } => *duration,
            Self::Ignored { .. } => Duration::ZERO,
        }
    }

    /// Reason attached to an ignored result
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ignored { reason } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }

    /// Failure or error
    pub fn is_err(&self) -> bool {
        self.error().is_some()
    }
}

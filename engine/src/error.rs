//! Error types for the execution engine
//!
//! Two families of errors exist:
//! - [`EngineError`]: fatal problems (validation, configuration) that abort the
//!   execution of a test case and are returned to the caller.
//! - [`TestError`]: everything a test, hook or timeout can raise. These are
//!   never propagated; they are attached to a [`TestResult`](crate::TestResult).

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors raised by the engine itself
///
/// These are never converted into a test result. The caller decides how to
/// surface them (usually as an engine-level failure of the whole run).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The test case cannot run on this platform
    #[error("Test '{test}' is not supported: {reason}")]
    Validation { test: String, reason: String },

    /// The test case carries a configuration the engine refuses to run
    #[error("Invalid configuration for test '{test}': {reason}")]
    Configuration { test: String, reason: String },
}

impl EngineError {
    /// Build a validation error for the given test
    pub fn validation(test: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            test: test.into(),
            reason: reason.into(),
        }
    }

    /// Build a configuration error for the given test
    pub fn configuration(test: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            test: test.into(),
            reason: reason.into(),
        }
    }
}

/// Error captured while running hooks or a test body
///
/// Cheap to clone so it can be attached to results, handed to after-test
/// hooks and stored in result maps.
#[derive(Error, Debug, Clone)]
pub enum TestError {
    /// The work did not finish within the configured duration
    #[error("Test did not complete within {}ms", .0.as_millis())]
    Timeout(Duration),

    /// An explicit assertion failure
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// The body or a hook panicked (this includes `assert!` failures)
    #[error("Test panicked: {0}")]
    Panicked(String),

    /// The run was cancelled while the test was in flight
    #[error("Test was cancelled")]
    Cancelled,

    /// Any other error returned by user code
    #[error("{0}")]
    Other(Arc<anyhow::Error>),
}

impl TestError {
    /// Shorthand for an assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }

    /// Normalize an error returned by user code
    ///
    /// A `TestError` wrapped inside the `anyhow::Error` is recovered as-is,
    /// anything else becomes [`TestError::Other`].
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<TestError>() {
            Ok(test_error) => test_error,
            Err(other) => Self::Other(Arc::new(other)),
        }
    }

    /// Whether this error maps to a `Failure` result rather than an `Error`
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Assertion(_) | Self::Panicked(_)
        )
    }

    /// Whether this error is a timeout signal
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<anyhow::Error> for TestError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_anyhow(err)
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(&message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic payload".to_string()
    }
}

/// Await user code, turning both returned errors and panics into a [`TestError`]
pub(crate) async fn catch_panic<F>(fut: F) -> Result<(), TestError>
where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(TestError::from_anyhow(err)),
        Err(payload) => Err(TestError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Convert a failed join of an engine task into a test error
pub(crate) fn join_error(err: tokio::task::JoinError) -> TestError {
    if err.is_cancelled() {
        TestError::Cancelled
    } else {
        match err.try_into_panic() {
            Ok(payload) => TestError::Panicked(panic_message(payload.as_ref())),
            Err(err) => TestError::Other(Arc::new(anyhow::anyhow!(err))),
        }
    }
}

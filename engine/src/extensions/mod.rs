//! Extension interception chain
//!
//! Extensions wrap the execution of a test case. They are composed by
//! continuation passing: each extension receives the test case and a [`Next`]
//! handle that runs the rest of the chain (and eventually the executor).
//! An extension may
//! - substitute a different test case before calling `next`,
//! - not call `next` at all and produce its own result,
//! - call `next` several times,
//! - post-process whatever `next` returns.
//!
//! The first registered extension is the outermost one.

pub mod metrics;
pub mod retry;
pub mod tags;

pub use self::metrics::{MetricsExtension, RunStats, RunStatsSnapshot};
pub use retry::RetryExtension;
pub use tags::{TagFilter, TagFilterExtension};

use crate::error::EngineError;
use crate::test_case::{TestCase, TestResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Interceptor around the execution of a single test case
#[async_trait]
pub trait TestCaseExtension: Send + Sync {
    async fn intercept(&self, test_case: TestCase, next: Next<'_>) -> Result<TestResult, EngineError>;
}

/// Innermost layer of a chain
pub(crate) trait Terminal: Send + Sync {
    fn run(&self, test_case: TestCase) -> BoxFuture<'_, Result<TestResult, EngineError>>;
}

/// Continuation running the remainder of an extension chain
///
/// `Next` is `Copy`; calling [`Next::run`] more than once re-runs everything
/// below the current extension.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [Arc<dyn TestCaseExtension>],
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn TestCaseExtension>], terminal: &'a dyn Terminal) -> Self {
        Self { chain, terminal }
    }

    /// Run the rest of the chain for `test_case`
    pub fn run(&self, test_case: TestCase) -> BoxFuture<'a, Result<TestResult, EngineError>> {
        match self.chain.split_first() {
            Some((extension, rest)) => extension.intercept(test_case, Next::new(rest, self.terminal)),
            None => self.terminal.run(test_case),
        }
    }

    /// Number of extensions still to run before the executor
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

/// Ordered, immutable list of extensions
#[derive(Clone, Default)]
pub struct ExtensionChain {
    extensions: Arc<Vec<Arc<dyn TestCaseExtension>>>,
}

impl ExtensionChain {
    pub fn new(extensions: Vec<Arc<dyn TestCaseExtension>>) -> Self {
        Self {
            extensions: Arc::new(extensions),
        }
    }

    /// This chain followed by `inner` (inner extensions run closer to the executor)
    pub fn then(&self, inner: &[Arc<dyn TestCaseExtension>]) -> Self {
        let mut extensions = self.extensions.as_ref().clone();
        extensions.extend(inner.iter().cloned());
        Self::new(extensions)
    }

    pub fn as_slice(&self) -> &[Arc<dyn TestCaseExtension>] {
        &self.extensions
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl FromIterator<Arc<dyn TestCaseExtension>> for ExtensionChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn TestCaseExtension>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

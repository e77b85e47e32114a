// File: engine/src/extensions/metrics.rs
//
// Execution Metrics
//
// Records one counter increment per terminal result (labelled by status) and
// the duration of every executed test through the `metrics` facade, and keeps
// an in-process tally that can be read without any recorder installed.

use super::{Next, TestCaseExtension};
use crate::error::EngineError;
use crate::test_case::{TestCase, TestResult, TestStatus};
use async_trait::async_trait;
use metrics::{counter, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter of terminal results, labelled with `status`
pub const TESTS_TOTAL: &str = "spindle_tests_total";
/// Histogram of test durations in milliseconds
pub const TEST_DURATION_MS: &str = "spindle_test_duration_ms";

/// Result tally of a run
#[derive(Debug, Default)]
pub struct RunStats {
    success: AtomicU64,
    failure: AtomicU64,
    error: AtomicU64,
    ignored: AtomicU64,
}

/// Point-in-time copy of [`RunStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatsSnapshot {
    pub success: u64,
    pub failure: u64,
    pub error: u64,
    pub ignored: u64,
}

impl RunStatsSnapshot {
    pub fn total(&self) -> u64 {
        self.success + self.failure + self.error + self.ignored
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: TestStatus) {
        let slot = match status {
            TestStatus::Success => &self.success,
            TestStatus::Failure => &self.failure,
            TestStatus::Error => &self.error,
            TestStatus::Ignored => &self.ignored,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            success: self.success.load(Ordering::Relaxed),
            failure: self.failure.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }
}

/// Observes every result passing back up the chain
///
/// Place it outermost to count what listeners will see; inner extensions
/// (a retry, for instance) are then already folded into one result.
pub struct MetricsExtension {
    stats: Arc<RunStats>,
}

impl MetricsExtension {
    pub fn new() -> Self {
        Self::with_stats(Arc::new(RunStats::new()))
    }

    /// Share a tally with other extensions or the caller
    pub fn with_stats(stats: Arc<RunStats>) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> &Arc<RunStats> {
        &self.stats
    }
}

impl Default for MetricsExtension {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestCaseExtension for MetricsExtension {
    async fn intercept(&self, test_case: TestCase, next: Next<'_>) -> Result<TestResult, EngineError> {
        let result = next.run(test_case).await?;

        let status = result.status();
        let label: &'static str = status.into();
        counter!(TESTS_TOTAL, "status" => label).increment(1u64);
        if !result.is_ignored() {
            histogram!(TEST_DURATION_MS).record(result.duration().as_millis() as f64);
        }
        self.stats.record(status);

        Ok(result)
    }
}

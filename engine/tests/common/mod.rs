// File: engine/tests/common/mod.rs
//
// Shared helpers for the engine integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use spindle_engine::prelude::*;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Ordered log shared by hooks, bodies and extensions of one test
#[derive(Clone, Default)]
pub struct Trace {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.count(entry) > 0
    }
}

/// Hook recording every call, optionally failing some of them
#[derive(Default)]
pub struct RecordingHook {
    pub name: &'static str,
    pub trace: Trace,
    pub fail_before: bool,
    pub fail_after: bool,
    pub fail_after_invocation: Option<usize>,
    /// Result status seen by `after_test`
    pub seen: Mutex<Vec<TestStatus>>,
    /// Error seen by `after_test`, formatted
    pub seen_errors: Mutex<Vec<String>>,
}

impl RecordingHook {
    pub fn new(name: &'static str, trace: Trace) -> Self {
        Self {
            name,
            trace,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TestCaseHook for RecordingHook {
    async fn before_test(&self, _test_case: &TestCase) -> anyhow::Result<()> {
        self.trace.push(format!("{}:before_test", self.name));
        if self.fail_before {
            anyhow::bail!("{} before_test failed", self.name);
        }
        Ok(())
    }

    async fn after_test(&self, _test_case: &TestCase, result: &TestResult) -> anyhow::Result<()> {
        self.trace.push(format!("{}:after_test", self.name));
        self.seen.lock().push(result.status());
        if let Some(error) = result.error() {
            self.seen_errors.lock().push(error.to_string());
        }
        if self.fail_after {
            anyhow::bail!("{} after_test failed", self.name);
        }
        Ok(())
    }

    async fn before_invocation(&self, _test_case: &TestCase, invocation: usize) -> anyhow::Result<()> {
        self.trace.push(format!("{}:before_invocation:{}", self.name, invocation));
        Ok(())
    }

    async fn after_invocation(&self, _test_case: &TestCase, invocation: usize) -> anyhow::Result<()> {
        self.trace.push(format!("{}:after_invocation:{}", self.name, invocation));
        if self.fail_after_invocation == Some(invocation) {
            anyhow::bail!("{} after_invocation {} failed", self.name, invocation);
        }
        Ok(())
    }
}

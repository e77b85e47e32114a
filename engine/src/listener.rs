//! Execution and engine listeners
//!
//! Listeners are called synchronously from the executor and must not panic.

use crate::spec::SpecId;
use crate::test_case::{TestCase, TestPath, TestResult, TestStatus};
use parking_lot::Mutex;
use std::sync::Arc;

/// Callbacks for the lifecycle of one test case
///
/// For a single execution, `test_started` always precedes `test_finished`,
/// and a test is never reported both ignored and finished.
pub trait TestExecutionListener: Send + Sync {
    fn test_started(&self, _test_case: &TestCase) {}

    fn test_ignored(&self, _test_case: &TestCase, _reason: Option<&str>) {}

    fn test_finished(&self, _test_case: &TestCase, _result: &TestResult) {}
}

/// Spec-level notifications
pub trait TestEngineListener: Send + Sync {
    /// No root test of the spec is enabled; nothing of it will execute
    fn spec_inactive(&self, _spec: &SpecId) {}
}

/// Listener that ignores everything
pub struct NoopListener;

impl TestExecutionListener for NoopListener {}

impl TestEngineListener for NoopListener {}

/// Fans every notification out to several listeners, in order
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn TestExecutionListener>>,
}

impl ListenerSet {
    pub fn new(listeners: Vec<Arc<dyn TestExecutionListener>>) -> Self {
        Self { listeners }
    }

    pub fn push(&mut self, listener: Arc<dyn TestExecutionListener>) {
        self.listeners.push(listener);
    }
}

impl TestExecutionListener for ListenerSet {
    fn test_started(&self, test_case: &TestCase) {
        for listener in &self.listeners {
            listener.test_started(test_case);
        }
    }

    fn test_ignored(&self, test_case: &TestCase, reason: Option<&str>) {
        for listener in &self.listeners {
            listener.test_ignored(test_case, reason);
        }
    }

    fn test_finished(&self, test_case: &TestCase, result: &TestResult) {
        for listener in &self.listeners {
            listener.test_finished(test_case, result);
        }
    }
}

/// Event captured by [`RecordingListener`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    Started(TestPath),
    Ignored(TestPath, Option<String>),
    Finished(TestPath, TestStatus),
    SpecInactive(SpecId),
}

/// Listener keeping every notification in memory
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far, in notification order
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().clone()
    }

    /// Events concerning one test
    pub fn events_for(&self, path: &TestPath) -> Vec<ListenerEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| match event {
                ListenerEvent::Started(p) | ListenerEvent::Ignored(p, _) | ListenerEvent::Finished(p, _) => p == path,
                ListenerEvent::SpecInactive(_) => false,
            })
            .cloned()
            .collect()
    }

    /// Number of `test_started` notifications
    pub fn started_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, ListenerEvent::Started(_)))
            .count()
    }
}

impl TestExecutionListener for RecordingListener {
    fn test_started(&self, test_case: &TestCase) {
        self.events
            .lock()
            .push(ListenerEvent::Started(test_case.path().clone()));
    }

    fn test_ignored(&self, test_case: &TestCase, reason: Option<&str>) {
        self.events.lock().push(ListenerEvent::Ignored(
            test_case.path().clone(),
            reason.map(str::to_string),
        ));
    }

    fn test_finished(&self, test_case: &TestCase, result: &TestResult) {
        self.events
            .lock()
            .push(ListenerEvent::Finished(test_case.path().clone(), result.status()));
    }
}

impl TestEngineListener for RecordingListener {
    fn spec_inactive(&self, spec: &SpecId) {
        self.events
            .lock()
            .push(ListenerEvent::SpecInactive(spec.clone()));
    }
}

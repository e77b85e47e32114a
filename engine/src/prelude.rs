//! Everything needed to declare and run specs

pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, TestError};
pub use crate::executor::{
    CancellationToken, DetachedTimeoutContext, InterruptingTimeoutContext, TaskScope, TestExecutor,
    TimeoutExecutionContext,
};
pub use crate::extensions::{
    ExtensionChain, MetricsExtension, Next, RetryExtension, RunStats, TagFilter, TagFilterExtension,
    TestCaseExtension,
};
pub use crate::listener::{ListenerEvent, NoopListener, RecordingListener, TestEngineListener, TestExecutionListener};
pub use crate::orchestrator::{Clock, PausedClock, SystemClock};
pub use crate::registry::ExtensionRegistry;
pub use crate::spec::{
    InactiveSpecListener, RunIfActiveInterceptor, Spec, SpecExecutionInterceptor, SpecExecutor, SpecId,
    SpecNext, SpecResults, TestCaseOrder,
};
pub use crate::test_case::{
    Enabled, TestCase, TestCaseBuilder, TestCaseConfig, TestCaseHook, TestContext, TestResult, TestStatus,
    TestType,
};

pub use async_trait::async_trait;
pub use std::sync::Arc;
pub use std::time::Duration;

// File: engine/tests/extension_chain_test.rs
//
// Extension Chain Integration Tests
//
// Continuation passing through test case extensions: skipping, nesting,
// substitution, repeated calls and the bundled extensions.

mod common;

use common::{init_logger, Trace};
use spindle_engine::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records entry and exit around the rest of the chain
struct Tracing {
    name: &'static str,
    trace: Trace,
}

#[async_trait]
impl TestCaseExtension for Tracing {
    async fn intercept(&self, test_case: TestCase, next: Next<'_>) -> Result<TestResult, EngineError> {
        self.trace.push(format!("{}:in", self.name));
        let result = next.run(test_case).await;
        self.trace.push(format!("{}:out", self.name));
        result
    }
}

/// Never calls the rest of the chain
struct Skip {
    trace: Trace,
}

#[async_trait]
impl TestCaseExtension for Skip {
    async fn intercept(&self, _test_case: TestCase, _next: Next<'_>) -> Result<TestResult, EngineError> {
        self.trace.push("skip");
        Ok(TestResult::ignored(Some("skipped by extension".to_string())))
    }
}

/// Replaces the configuration before continuing
struct Substitute {
    invocations: usize,
}

#[async_trait]
impl TestCaseExtension for Substitute {
    async fn intercept(&self, test_case: TestCase, next: Next<'_>) -> Result<TestResult, EngineError> {
        let config = TestCaseConfig {
            invocations: self.invocations,
            ..test_case.config().clone()
        };
        next.run(test_case.with_config(config)).await
    }
}

fn traced_test(trace: &Trace) -> TestCase {
    let trace = trace.clone();
    TestCase::builder("traced")
        .body(move |_ctx| {
            let trace = trace.clone();
            async move {
                trace.push("core");
                Ok(())
            }
        })
        .build("ChainSpec")
}

async fn run(executor: &TestExecutor, test: &TestCase) -> Result<TestResult, EngineError> {
    executor.execute(test.clone(), &TestContext::detached(test.clone())).await
}

// ============================================================================
// Chain composition
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_outer_extension_skipping_bypasses_inner_and_core() {
    init_logger();
    let trace = Trace::new();
    let listener = Arc::new(RecordingListener::new());
    let executor = TestExecutor::builder()
        .listener(listener.clone())
        .extension(Arc::new(Skip { trace: trace.clone() }))
        .extension(Arc::new(Tracing {
            name: "B",
            trace: trace.clone(),
        }))
        .build();
    let test = traced_test(&trace);

    let result = run(&executor, &test).await.unwrap();

    assert_eq!(result.reason(), Some("skipped by extension"));
    assert_eq!(trace.entries(), vec!["skip"]);
    assert_eq!(listener.started_count(), 0);
    assert_eq!(
        listener.events(),
        vec![ListenerEvent::Ignored(
            test.path().clone(),
            Some("skipped by extension".to_string())
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_first_registered_extension_is_outermost() {
    let trace = Trace::new();
    let executor = TestExecutor::builder()
        .extension(Arc::new(Tracing {
            name: "A",
            trace: trace.clone(),
        }))
        .extension(Arc::new(Tracing {
            name: "B",
            trace: trace.clone(),
        }))
        .build();
    assert_eq!(executor.extensions().len(), 2);

    let result = run(&executor, &traced_test(&trace)).await.unwrap();

    assert!(result.is_success());
    assert_eq!(trace.entries(), vec!["A:in", "B:in", "core", "B:out", "A:out"]);
}

#[tokio::test(start_paused = true)]
async fn test_substituted_test_case_is_executed() {
    let trace = Trace::new();
    let executor = TestExecutor::builder()
        .extension(Arc::new(Substitute { invocations: 3 }))
        .build();

    let result = run(&executor, &traced_test(&trace)).await.unwrap();

    assert!(result.is_success());
    assert_eq!(trace.count("core"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_substituted_configuration_is_checked_again() {
    let executor = TestExecutor::builder()
        .extension(Arc::new(Substitute { invocations: 2 }))
        .build();
    let container = TestCase::builder("parent").container().build("ChainSpec");

    let err = run(&executor, &container).await.unwrap_err();
    assert!(matches!(err, EngineError::Configuration { .. }));
}

// ============================================================================
// Bundled extensions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_calls_the_chain_again_until_success() {
    let listener = Arc::new(RecordingListener::new());
    let attempts = Arc::new(AtomicUsize::new(0));
    let executor = TestExecutor::builder()
        .listener(listener.clone())
        .extension(Arc::new(RetryExtension::new(3)))
        .build();

    let counter = attempts.clone();
    let test = TestCase::builder("flaky")
        .body(move |_ctx| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("not yet");
                }
                Ok(())
            }
        })
        .build("ChainSpec");

    let result = run(&executor, &test).await.unwrap();

    assert!(result.is_success());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(listener.started_count(), 3);
    assert_eq!(
        listener.events().last(),
        Some(&ListenerEvent::Finished(test.path().clone(), TestStatus::Success))
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_gives_up_after_max_retries() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let executor = TestExecutor::builder()
        .extension(Arc::new(RetryExtension::new(2)))
        .build();

    let counter = attempts.clone();
    let test = TestCase::builder("broken")
        .body(move |_ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("always")
            }
        })
        .build("ChainSpec");

    let result = run(&executor, &test).await.unwrap();
    assert_eq!(result.status(), TestStatus::Error);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_tag_filter_extension_skips_excluded_tests() {
    let trace = Trace::new();
    let executor = TestExecutor::builder()
        .extension(Arc::new(TagFilterExtension::new(TagFilter::default().exclude("slow"))))
        .build();

    let body_trace = trace.clone();
    let slow = TestCase::builder("slow one")
        .tag("slow")
        .body(move |_ctx| {
            let trace = body_trace.clone();
            async move {
                trace.push("core");
                Ok(())
            }
        })
        .build("ChainSpec");

    let result = run(&executor, &slow).await.unwrap();
    assert!(result.is_ignored());
    assert!(result.reason().unwrap().contains("excluded by tag filter"));
    assert!(trace.entries().is_empty());

    let result = run(&executor, &traced_test(&trace)).await.unwrap();
    assert!(result.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_metrics_extension_counts_results() {
    let metrics = Arc::new(MetricsExtension::new());
    let executor = TestExecutor::builder().extension(metrics.clone()).build();

    let passing = TestCase::builder("passes").build("ChainSpec");
    let failing = TestCase::builder("fails")
        .body(|_ctx| async { Err(TestError::assertion("nope").into()) })
        .build("ChainSpec");
    let ignored = TestCase::builder("!ignored").build("ChainSpec");

    for test in [&passing, &failing, &ignored] {
        run(&executor, test).await.unwrap();
    }

    let snapshot = metrics.stats().snapshot();
    assert_eq!(snapshot.success, 1);
    assert_eq!(snapshot.failure, 1);
    assert_eq!(snapshot.ignored, 1);
    assert_eq!(snapshot.total(), 3);
}

//! Spec executor
//!
//! Runs the spec interceptor chain and, at its bottom, every root test of the
//! spec through a [`TestExecutor`]. Nested tests registered from a running
//! body are built as children of the registering test and executed right
//! away, inside the parent's execution.
//!
//! A parent that times out or is cancelled tears its body down, and with it
//! any nested test still executing. Those children are resolved when the
//! parent finishes: a started child gets a result carrying the parent's
//! timeout (or a cancellation), a child that never started is ignored. Late
//! notifications from children still running in the background are dropped.

use super::interceptor::{RunIfActiveInterceptor, SpecExecutionInterceptor, SpecNext, SpecTerminal};
use super::{RootTestOrder, Spec, SpecResults};
use crate::config::EngineConfig;
use crate::error::{EngineError, TestError};
use crate::executor::{CancellationToken, TestCaseValidator, TestExecutor, TimeoutExecutionContext};
use crate::extensions::{ExtensionChain, TagFilterExtension, TestCaseExtension};
use crate::listener::{NoopListener, TestEngineListener, TestExecutionListener};
use crate::orchestrator::{Clock, SystemClock, TimeMark};
use crate::registry::ExtensionRegistry;
use crate::test_case::{NestedTest, NestedTestRegistrar, TestCase, TestContext, TestPath, TestResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Executes specs
///
/// # Example
///
/// ```rust,ignore
/// let executor = SpecExecutor::builder()
///     .registry(registry)
///     .config(Arc::new(EngineConfig::load("spindle.yaml")?))
///     .listener(listener.clone())
///     .build();
///
/// let results = executor.execute(&spec).await?;
/// ```
pub struct SpecExecutor {
    registry: Arc<ExtensionRegistry>,
    config: Arc<EngineConfig>,
    listener: Arc<dyn TestExecutionListener>,
    interceptors: Vec<Arc<dyn SpecExecutionInterceptor>>,
    extensions: ExtensionChain,
    order: RootTestOrder,
    clock: Arc<dyn Clock>,
    timeout_context: Option<Arc<dyn TimeoutExecutionContext>>,
    validator: Option<TestCaseValidator>,
    cancellation: CancellationToken,
}

impl SpecExecutor {
    pub fn builder() -> SpecExecutorBuilder {
        SpecExecutorBuilder::new()
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    /// Order applied to the root tests of every spec
    pub fn order(&self) -> RootTestOrder {
        self.order
    }

    /// Execute `spec` and return the result of every test it ran or skipped
    ///
    /// # Errors
    ///
    /// Validation and configuration errors abort the spec and are returned
    /// as-is; results collected so far are dropped. Root tests sharing a
    /// name are rejected before anything runs.
    pub async fn execute(&self, spec: &Spec) -> Result<SpecResults, EngineError> {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("[SPEC] Executing {} ({} root tests)", spec.id(), spec.root_tests().len());
        }
        spec.check_root_names()?;

        let terminal = RootTestsTerminal { executor: self };
        let results = SpecNext::new(&self.interceptors, &terminal).run(spec).await?;

        if log::log_enabled!(log::Level::Info) {
            let failed = results.values().filter(|r| r.is_err()).count();
            let ignored = results.values().filter(|r| r.is_ignored()).count();
            log::info!(
                "[SPEC] {} completed: {} tests, {} failed, {} ignored",
                spec.id(),
                results.len(),
                failed,
                ignored
            );
        }
        Ok(results)
    }

    fn test_executor(&self, spec: &Spec, listener: Arc<dyn TestExecutionListener>) -> TestExecutor {
        let mut builder = TestExecutor::builder()
            .listener(listener)
            .extensions(&self.extensions.then(spec.extensions().as_slice()))
            .clock(self.clock.clone())
            .config(self.config.clone())
            .cancellation(self.cancellation.clone());
        if let Some(timeout_context) = &self.timeout_context {
            builder = builder.timeout_context(timeout_context.clone());
        }
        if let Some(validator) = &self.validator {
            let validator = validator.clone();
            builder = builder.validator(move |test_case| validator(test_case));
        }
        builder.build()
    }

    async fn execute_root_tests(&self, spec: &Spec) -> Result<SpecResults, EngineError> {
        let state = Arc::new(Mutex::new(RunState::default()));
        let listener = Arc::new(RunListener {
            inner: self.listener.clone(),
            state: state.clone(),
        });
        let registrar = ExecutingRegistrar {
            executor: Arc::new(self.test_executor(spec, listener)),
            state: state.clone(),
            clock: self.clock.clone(),
        };

        for root in spec.materialize_and_order_root_tests(&self.order) {
            if self.cancellation.is_cancelled() {
                let reason = Some("Run cancelled before the test started".to_string());
                self.listener.test_ignored(&root, reason.as_deref());
                state.lock().results.insert(root, TestResult::ignored(reason));
                continue;
            }
            registrar.execute(root).await?;
        }

        let results = std::mem::take(&mut state.lock().results);
        Ok(results)
    }
}

struct RootTestsTerminal<'e> {
    executor: &'e SpecExecutor,
}

impl SpecTerminal for RootTestsTerminal<'_> {
    fn run<'s>(&'s self, spec: &'s Spec) -> BoxFuture<'s, Result<SpecResults, EngineError>> {
        self.executor.execute_root_tests(spec).boxed()
    }
}

/// Execution that has begun but not returned yet
struct InFlight {
    test_case: TestCase,
    mark: TimeMark,
    started: bool,
}

/// Bookkeeping of one spec run
#[derive(Default)]
struct RunState {
    results: SpecResults,
    /// Every path executed so far
    seen: HashSet<TestPath>,
    /// In registration order
    in_flight: IndexMap<TestPath, InFlight>,
    /// Resolved on behalf of a parent that finished before them
    orphaned: HashSet<TestPath>,
}

impl RunState {
    /// Forget the descendants of `parent` recorded by an earlier attempt
    fn restart(&mut self, parent: &TestCase) {
        let path = parent.path();
        self.seen.retain(|p| !path.is_ancestor_of(p));
        self.results.retain(|t, _| !path.is_ancestor_of(t.path()));
    }

    /// Close `parent` for registrations and resolve every in-flight
    /// descendant of it, deepest first
    fn resolve_orphans(&mut self, parent: &TestCase, parent_result: Option<&TestResult>) -> Vec<(TestCase, TestResult)> {
        self.in_flight.shift_remove(parent.path());
        let paths: Vec<TestPath> = self
            .in_flight
            .keys()
            .filter(|path| parent.path().is_ancestor_of(path))
            .cloned()
            .collect();

        let cause = match parent_result.and_then(TestResult::error) {
            Some(error) if error.is_timeout() => error.clone(),
            _ => TestError::Cancelled,
        };

        let mut resolved = Vec::with_capacity(paths.len());
        for path in paths.into_iter().rev() {
            let Some(in_flight) = self.in_flight.shift_remove(&path) else {
                continue;
            };
            let result = if in_flight.started {
                TestResult::from_error(cause.clone(), in_flight.mark.elapsed())
            } else {
                TestResult::ignored(Some(format!("Parent test {} did not complete", parent.path())))
            };
            self.orphaned.insert(path);
            self.results.insert(in_flight.test_case.clone(), result.clone());
            resolved.push((in_flight.test_case, result));
        }
        resolved
    }
}

/// Forwards notifications while keeping [`RunState`] in step
///
/// Finishing a test first resolves its orphaned descendants, so children are
/// always reported before their parent. Notifications for orphaned tests are
/// dropped.
struct RunListener {
    inner: Arc<dyn TestExecutionListener>,
    state: Arc<Mutex<RunState>>,
}

impl RunListener {
    fn settle(&self, test_case: &TestCase, result: Option<&TestResult>) -> Option<Vec<(TestCase, TestResult)>> {
        let mut state = self.state.lock();
        if state.orphaned.contains(test_case.path()) {
            return None;
        }
        Some(state.resolve_orphans(test_case, result))
    }

    fn report_orphans(&self, parent: &TestCase, orphans: Vec<(TestCase, TestResult)>) {
        for (orphan, result) in orphans {
            if log::log_enabled!(log::Level::Debug) {
                log::debug!(
                    "[SPEC] {} resolved as {} because {} completed first",
                    orphan.path(),
                    result.status(),
                    parent.path()
                );
            }
            match &result {
                TestResult::Ignored { reason } => self.inner.test_ignored(&orphan, reason.as_deref()),
                _ => self.inner.test_finished(&orphan, &result),
            }
        }
    }
}

impl TestExecutionListener for RunListener {
    fn test_started(&self, test_case: &TestCase) {
        {
            let mut state = self.state.lock();
            if state.orphaned.contains(test_case.path()) {
                return;
            }
            if let Some(in_flight) = state.in_flight.get_mut(test_case.path()) {
                in_flight.started = true;
            }
            // started again by a retrying extension
            state.restart(test_case);
        }
        self.inner.test_started(test_case);
    }

    fn test_ignored(&self, test_case: &TestCase, reason: Option<&str>) {
        if let Some(orphans) = self.settle(test_case, None) {
            self.report_orphans(test_case, orphans);
            self.inner.test_ignored(test_case, reason);
        }
    }

    fn test_finished(&self, test_case: &TestCase, result: &TestResult) {
        if let Some(orphans) = self.settle(test_case, Some(result)) {
            self.report_orphans(test_case, orphans);
            self.inner.test_finished(test_case, result);
        }
    }
}

/// Executes nested tests as soon as they are registered
#[derive(Clone)]
struct ExecutingRegistrar {
    executor: Arc<TestExecutor>,
    state: Arc<Mutex<RunState>>,
    clock: Arc<dyn Clock>,
}

impl ExecutingRegistrar {
    async fn execute(&self, test_case: TestCase) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            if !state.seen.insert(test_case.path().clone()) {
                return Err(EngineError::configuration(
                    test_case.path().to_string(),
                    "Duplicate test name",
                ));
            }
            state.in_flight.insert(
                test_case.path().clone(),
                InFlight {
                    test_case: test_case.clone(),
                    mark: TimeMark::now(self.clock.clone()),
                    started: false,
                },
            );
        }

        let context = TestContext::new(test_case.clone(), Arc::new(self.clone()));
        let outcome = self.executor.execute(test_case.clone(), &context).await;

        let mut state = self.state.lock();
        state.in_flight.shift_remove(test_case.path());
        if state.orphaned.contains(test_case.path()) {
            // already resolved when its parent finished
            return Ok(());
        }
        let result = outcome?;
        state.results.insert(test_case, result);
        Ok(())
    }
}

#[async_trait]
impl NestedTestRegistrar for ExecutingRegistrar {
    async fn register(&self, parent: &TestCase, nested: NestedTest) -> Result<(), EngineError> {
        let child = parent.child(nested);
        let parent_running = self.state.lock().in_flight.contains_key(parent.path());
        if !parent_running {
            return Err(EngineError::configuration(
                child.path().to_string(),
                format!("Parent test {} has already completed", parent.path()),
            ));
        }
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("[SPEC] Registered nested test {}", child.path());
        }
        self.execute(child).await
    }
}

/// Builder for [`SpecExecutor`]
pub struct SpecExecutorBuilder {
    registry: Option<Arc<ExtensionRegistry>>,
    config: Option<Arc<EngineConfig>>,
    listener: Option<Arc<dyn TestExecutionListener>>,
    engine_listener: Option<Arc<dyn TestEngineListener>>,
    clock: Option<Arc<dyn Clock>>,
    timeout_context: Option<Arc<dyn TimeoutExecutionContext>>,
    validator: Option<TestCaseValidator>,
    cancellation: Option<CancellationToken>,
}

impl SpecExecutorBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            config: None,
            listener: None,
            engine_listener: None,
            clock: None,
            timeout_context: None,
            validator: None,
            cancellation: None,
        }
    }

    pub fn registry(mut self, registry: Arc<ExtensionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: Arc<EngineConfig>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn TestExecutionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn engine_listener(mut self, listener: Arc<dyn TestEngineListener>) -> Self {
        self.engine_listener = Some(listener);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn timeout_context(mut self, timeout_context: Arc<dyn TimeoutExecutionContext>) -> Self {
        self.timeout_context = Some(timeout_context);
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&TestCase) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(self) -> SpecExecutor {
        let registry = self.registry.unwrap_or_default();
        let config = self.config.unwrap_or_default();
        let order = RootTestOrder::from_config(&config);
        let tags = config.tag_filter();

        let engine_listener = self.engine_listener.unwrap_or_else(|| Arc::new(NoopListener));
        let mut interceptors: Vec<Arc<dyn SpecExecutionInterceptor>> = vec![Arc::new(RunIfActiveInterceptor::new(
            engine_listener,
            registry.inactive_spec_listeners().to_vec(),
            tags.clone(),
            order,
        ))];
        interceptors.extend(registry.spec_interceptors().iter().cloned());

        let mut extensions: Vec<Arc<dyn TestCaseExtension>> = Vec::new();
        if !tags.is_empty() {
            extensions.push(Arc::new(TagFilterExtension::new(tags)));
        }
        let extensions = ExtensionChain::new(extensions).then(registry.test_case_extensions().as_slice());

        SpecExecutor {
            registry,
            config,
            listener: self.listener.unwrap_or_else(|| Arc::new(NoopListener)),
            interceptors,
            extensions,
            order,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            timeout_context: self.timeout_context,
            validator: self.validator,
            cancellation: self.cancellation.unwrap_or_default(),
        }
    }
}

impl Default for SpecExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

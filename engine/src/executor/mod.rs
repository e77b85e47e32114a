//! Test executor
//!
//! Drives a single [`TestCase`] to completion:
//!
//! 1. validate the test case (fatal, nothing is notified)
//! 2. take a [`TimeMark`]
//! 3. run the extension chain; at its bottom check the test is active
//! 4. notify `test_started`, run before-test hooks, run the body under the
//!    timeout context (repeated per the invocation settings), run after-test
//!    hooks
//! 5. resolve the result with after-hook > before-hook > body priority
//! 6. notify `test_finished` or `test_ignored` exactly once
//!
//! Validation and configuration problems are returned as [`EngineError`];
//! everything else ends up inside the returned [`TestResult`].

pub mod cancel;
pub(crate) mod replay;
pub(crate) mod resolve;
pub mod scope;
pub mod timeout;

pub use cancel::CancellationToken;
pub use scope::TaskScope;
pub use timeout::{DetachedTimeoutContext, InterruptingTimeoutContext, TimeoutExecutionContext, TimedWork};

use crate::config::EngineConfig;
use crate::error::{EngineError, TestError};
use crate::extensions::{ExtensionChain, Next, Terminal};
use crate::listener::{NoopListener, TestExecutionListener};
use crate::orchestrator::{Clock, SystemClock, TimeMark};
use crate::test_case::hooks::{invoke_after_test, invoke_before_test};
use crate::test_case::{TestCase, TestContext, TestResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use replay::Replay;
use resolve::{Resolution, Stage};
use std::sync::Arc;

/// Platform check run before anything else; an error aborts the execution
pub type TestCaseValidator = Arc<dyn Fn(&TestCase) -> Result<(), EngineError> + Send + Sync>;

/// Pick the timeout strategy selected by the engine configuration
pub fn timeout_context_for(config: &EngineConfig, clock: Arc<dyn Clock>) -> Arc<dyn TimeoutExecutionContext> {
    if config.interrupt_on_timeout {
        Arc::new(InterruptingTimeoutContext::new(clock))
    } else {
        Arc::new(DetachedTimeoutContext::new(clock))
    }
}

/// Executes single test cases
///
/// An executor holds no per-test state, so one instance can execute any
/// number of test cases, concurrently or not.
///
/// # Example
///
/// ```rust,ignore
/// let executor = TestExecutor::builder()
///     .listener(listener.clone())
///     .extension(Arc::new(TagFilterExtension::new(filter)))
///     .build();
///
/// let test = TestCase::builder("works").body(|_ctx| async { Ok(()) }).build("Spec");
/// let result = executor.execute(test.clone(), &TestContext::detached(test)).await?;
/// assert!(result.is_success());
/// ```
pub struct TestExecutor {
    listener: Arc<dyn TestExecutionListener>,
    timeout_context: Arc<dyn TimeoutExecutionContext>,
    extensions: ExtensionChain,
    validator: Option<TestCaseValidator>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
    cancellation: CancellationToken,
}

impl TestExecutor {
    pub fn builder() -> TestExecutorBuilder {
        TestExecutorBuilder::new()
    }

    /// Extensions wrapped around every execution, outermost first
    pub fn extensions(&self) -> &ExtensionChain {
        &self.extensions
    }

    /// Execute `test_case` and return its result
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - the validator rejects the test case
    /// - the test case configuration cannot be executed (a container with
    ///   several invocations, zero invocations or zero threads)
    pub async fn execute(&self, test_case: TestCase, context: &TestContext) -> Result<TestResult, EngineError> {
        if let Some(validate) = &self.validator {
            validate(&test_case)?;
        }
        test_case.check_config()?;

        let mark = TimeMark::now(self.clock.clone());
        let terminal = ActiveTestTerminal {
            executor: self,
            context,
            mark: &mark,
        };
        let result = Next::new(self.extensions.as_slice(), &terminal)
            .run(test_case.clone())
            .await?;

        match &result {
            TestResult::Ignored { reason } => self.listener.test_ignored(&test_case, reason.as_deref()),
            _ => self.listener.test_finished(&test_case, &result),
        }
        Ok(result)
    }

    /// Bottom of the extension chain
    async fn execute_if_active(
        &self,
        test_case: TestCase,
        context: &TestContext,
        mark: &TimeMark,
    ) -> Result<TestResult, EngineError> {
        // extensions may have substituted the test case
        test_case.check_config()?;

        let enabled = test_case.enabled();
        if enabled.is_disabled() {
            if log::log_enabled!(log::Level::Debug) {
                log::debug!(
                    "[EXECUTOR] {} is inactive: {}",
                    test_case.path(),
                    enabled.reason().unwrap_or("no reason given")
                );
            }
            return Ok(TestResult::ignored(enabled.into_reason()));
        }

        Ok(self.execute_active_test(test_case, context, mark).await)
    }

    /// Run hooks and body of an active test
    ///
    /// If the before-test hooks fail the body is skipped, but the after-test
    /// hooks still run and the before-hook error becomes the result. A run
    /// cancelled by the time the before-test hooks return skips the body
    /// with [`TestError::Cancelled`]. If the
    /// after-test hooks fail, their error replaces whatever came before.
    async fn execute_active_test(&self, test_case: TestCase, context: &TestContext, mark: &TimeMark) -> TestResult {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("[EXECUTOR] Executing active test {}", test_case.path());
        }
        self.listener.test_started(&test_case);

        let mut resolution = Resolution::default();

        let before = invoke_before_test(&test_case).await;
        let run_body = before.is_ok();
        resolution.record(Stage::BeforeTest, before);

        if run_body {
            // cancelled while the before-test hooks ran
            let body = if self.cancellation.is_cancelled() {
                Err(TestError::Cancelled)
            } else {
                self.invoke_test_case(&test_case, context).await
            };
            resolution.record(Stage::Body, body);
        }

        let so_far = resolution.to_result(mark.elapsed());
        let after = invoke_after_test(&test_case, &so_far).await;
        resolution.record(Stage::AfterTest, after);

        let result = resolution.to_result(mark.elapsed());
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "[EXECUTOR] {} completed with {} in {}ms",
                test_case.path(),
                result.status(),
                result.duration().as_millis()
            );
        }
        result
    }

    /// Run all invocations of the body under the overall timeout
    ///
    /// The body runs inside a fresh [`TaskScope`]; the scope is joined before
    /// the outcome is returned, and aborted on failure, timeout or
    /// cancellation.
    async fn invoke_test_case(&self, test_case: &TestCase, context: &TestContext) -> Result<(), TestError> {
        let config = test_case.config();
        let timeout = config.resolved_timeout(&self.config);
        let replay = Replay {
            invocations: config.invocations,
            threads: config.threads,
            invocation_timeout: config.resolved_invocation_timeout(&self.config),
            timeout_context: self.timeout_context.clone(),
        };

        let scope = TaskScope::new();
        let derived = context.derive(test_case.clone(), scope.clone());
        let work = {
            let test_case = test_case.clone();
            let scope = scope.clone();
            async move {
                let body = replay.run(test_case, derived).await;
                if body.is_ok() {
                    scope.join_all().await
                } else {
                    scope.abort_all();
                    body
                }
            }
            .boxed()
        };

        let outcome = tokio::select! {
            outcome = self.timeout_context.execute_with_timeout_interruption(timeout, work) => outcome,
            _ = self.cancellation.cancelled() => Err(TestError::Cancelled),
        };

        if outcome.is_err() {
            scope.abort_all();
        }
        outcome
    }
}

struct ActiveTestTerminal<'e> {
    executor: &'e TestExecutor,
    context: &'e TestContext,
    mark: &'e TimeMark,
}

impl Terminal for ActiveTestTerminal<'_> {
    fn run(&self, test_case: TestCase) -> BoxFuture<'_, Result<TestResult, EngineError>> {
        self.executor
            .execute_if_active(test_case, self.context, self.mark)
            .boxed()
    }
}

/// Builder for [`TestExecutor`]
pub struct TestExecutorBuilder {
    listener: Option<Arc<dyn TestExecutionListener>>,
    timeout_context: Option<Arc<dyn TimeoutExecutionContext>>,
    extensions: Vec<Arc<dyn crate::extensions::TestCaseExtension>>,
    validator: Option<TestCaseValidator>,
    clock: Option<Arc<dyn Clock>>,
    config: Option<Arc<EngineConfig>>,
    cancellation: Option<CancellationToken>,
}

impl TestExecutorBuilder {
    pub fn new() -> Self {
        Self {
            listener: None,
            timeout_context: None,
            extensions: Vec::new(),
            validator: None,
            clock: None,
            config: None,
            cancellation: None,
        }
    }

    pub fn listener(mut self, listener: Arc<dyn TestExecutionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Timeout strategy; defaults to the one selected by the engine config
    pub fn timeout_context(mut self, timeout_context: Arc<dyn TimeoutExecutionContext>) -> Self {
        self.timeout_context = Some(timeout_context);
        self
    }

    /// Append an extension (later extensions run closer to the test)
    pub fn extension(mut self, extension: Arc<dyn crate::extensions::TestCaseExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Append every extension of `chain`
    pub fn extensions(mut self, chain: &ExtensionChain) -> Self {
        self.extensions.extend(chain.as_slice().iter().cloned());
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&TestCase) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: Arc<EngineConfig>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(self) -> TestExecutor {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let config = self.config.unwrap_or_default();
        let timeout_context = self
            .timeout_context
            .unwrap_or_else(|| timeout_context_for(&config, clock.clone()));

        TestExecutor {
            listener: self.listener.unwrap_or_else(|| Arc::new(NoopListener)),
            timeout_context,
            extensions: ExtensionChain::new(self.extensions),
            validator: self.validator,
            clock,
            config,
            cancellation: self.cancellation.unwrap_or_default(),
        }
    }
}

impl Default for TestExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

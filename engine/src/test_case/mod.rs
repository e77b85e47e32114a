//! Test case model
//!
//! A [`TestCase`] is the immutable description of one node in the test tree:
//! its path, its [`TestType`], its [`TestCaseConfig`], the hooks wrapped
//! around it and the body to run. Test cases are cheap to clone (the data sits
//! behind an `Arc`) and are never mutated; extensions that want a different
//! configuration derive a new test case with [`TestCase::with_config`].

pub mod config;
pub mod context;
pub mod hooks;
pub mod result;

pub use config::{Enabled, EnabledIf, TestCaseConfig};
pub use context::{CollectingRegistrar, NestedTestRegistrar, TestContext};
pub use hooks::TestCaseHook;
pub use result::{TestResult, TestStatus};

use crate::error::EngineError;
use crate::spec::SpecId;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Kind of node in the test tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum TestType {
    /// A node that may register nested tests
    Container,
    /// A leaf test
    Test,
    /// Either of the above, produced dynamically (data-driven or property tests)
    Dynamic,
}

/// Body of a test case
pub type TestBody = Arc<dyn Fn(TestContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Nested tests are declared with the same builder as root tests
pub type NestedTest = TestCaseBuilder;

/// Fully qualified identity of a test case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestPath {
    spec: SpecId,
    names: Vec<String>,
}

impl TestPath {
    /// Path of a root test inside `spec`
    pub fn root(spec: SpecId, name: impl Into<String>) -> Self {
        Self {
            spec,
            names: vec![name.into()],
        }
    }

    /// Path of a test nested under this one
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut names = self.names.clone();
        names.push(name.into());
        Self {
            spec: self.spec.clone(),
            names,
        }
    }

    /// Spec the test belongs to
    pub fn spec(&self) -> &SpecId {
        &self.spec
    }

    /// Names from the root test down to this one
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name of the test itself
    pub fn leaf(&self) -> &str {
        self.names.last().map(String::as_str).unwrap_or_default()
    }

    /// Number of ancestors (0 for root tests)
    pub fn depth(&self) -> usize {
        self.names.len().saturating_sub(1)
    }

    /// Whether `other` is nested (at any depth) under this path
    pub fn is_ancestor_of(&self, other: &TestPath) -> bool {
        self.spec == other.spec && other.names.len() > self.names.len() && other.names.starts_with(&self.names)
    }
}

impl fmt::Display for TestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.spec, self.names.join(" -- "))
    }
}

#[derive(Clone)]
struct TestCaseInner {
    path: TestPath,
    test_type: TestType,
    config: TestCaseConfig,
    hooks: Vec<Arc<dyn TestCaseHook>>,
    body: TestBody,
    /// Verdict of the parent at the time the child was declared
    parent: Option<Enabled>,
}

/// Immutable description of a test node
///
/// Equality and hashing use the [`TestPath`] only, so a test case derived via
/// [`TestCase::with_config`] is the same key in a result map.
#[derive(Clone)]
pub struct TestCase {
    inner: Arc<TestCaseInner>,
}

impl TestCase {
    /// Start declaring a test case
    pub fn builder(name: impl Into<String>) -> TestCaseBuilder {
        TestCaseBuilder::new(name)
    }

    /// Build a test case nested under this one
    ///
    /// The child inherits the parent's hooks (parent hooks first), its tags,
    /// and its enablement verdict.
    pub fn child(&self, nested: NestedTest) -> TestCase {
        let TestCaseBuilder {
            name,
            test_type,
            mut config,
            hooks,
            body,
        } = nested;

        config.tags.extend(self.config().tags.iter().cloned());

        let mut all_hooks = self.inner.hooks.clone();
        all_hooks.extend(hooks);

        TestCase {
            inner: Arc::new(TestCaseInner {
                path: self.inner.path.child(name),
                test_type,
                config,
                hooks: all_hooks,
                body: body.unwrap_or_else(noop_body),
                parent: Some(self.enabled()),
            }),
        }
    }

    /// Display name (the last element of the path)
    pub fn name(&self) -> &str {
        self.inner.path.leaf()
    }

    /// Fully qualified path
    pub fn path(&self) -> &TestPath {
        &self.inner.path
    }

    /// Spec owning this test
    pub fn spec(&self) -> &SpecId {
        self.inner.path.spec()
    }

    /// Node kind
    pub fn test_type(&self) -> TestType {
        self.inner.test_type
    }

    /// Resolved configuration
    pub fn config(&self) -> &TestCaseConfig {
        &self.inner.config
    }

    /// Hooks in registration order
    pub fn hooks(&self) -> &[Arc<dyn TestCaseHook>] {
        &self.inner.hooks
    }

    /// Whether this test was declared under another test
    pub fn is_nested(&self) -> bool {
        self.inner.parent.is_some()
    }

    pub(crate) fn body(&self) -> &TestBody {
        &self.inner.body
    }

    /// Derive a new test case with a different configuration
    pub fn with_config(&self, config: TestCaseConfig) -> TestCase {
        let mut inner = (*self.inner).clone();
        inner.config = config;
        TestCase {
            inner: Arc::new(inner),
        }
    }

    /// Enablement verdict from the rules carried by the test itself
    ///
    /// Rules, first disabling one wins:
    /// 1. a name starting with `!`
    /// 2. `enabled = false` in the config
    /// 3. the `enabled_if` predicate
    /// 4. a disabled parent
    pub fn enabled(&self) -> Enabled {
        if self.name().starts_with('!') {
            return Enabled::disabled(format!("{} is disabled by bang", self.path()));
        }
        if !self.config().enabled {
            return Enabled::disabled(format!(
                "{} is disabled by enabled flag in config",
                self.path()
            ));
        }
        if let Some(predicate) = &self.config().enabled_if {
            let verdict = predicate(self);
            if verdict.is_disabled() {
                return verdict;
            }
        }
        match &self.inner.parent {
            Some(parent) if parent.is_disabled() => Enabled::disabled(format!(
                "Disabled by parent: {}",
                parent.reason().unwrap_or("no reason given")
            )),
            _ => Enabled::enabled(),
        }
    }

    /// Whether the test is eligible to run
    pub fn is_active(&self) -> bool {
        self.enabled().is_enabled()
    }

    /// Reject configurations the executor refuses to run
    pub fn check_config(&self) -> Result<(), EngineError> {
        let config = self.config();
        if config.invocations == 0 {
            return Err(EngineError::configuration(
                self.path().to_string(),
                "Invocations must be at least 1",
            ));
        }
        if config.threads == 0 {
            return Err(EngineError::configuration(
                self.path().to_string(),
                "Threads must be at least 1",
            ));
        }
        if config.invocations > 1 && self.test_type() == TestType::Container {
            return Err(EngineError::configuration(
                self.path().to_string(),
                "Cannot execute multiple invocations in parent tests",
            ));
        }
        Ok(())
    }
}

impl PartialEq for TestCase {
    fn eq(&self, other: &Self) -> bool {
        self.inner.path == other.inner.path
    }
}

impl Eq for TestCase {}

impl Hash for TestCase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.path.hash(state);
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("path", &self.inner.path)
            .field("type", &self.inner.test_type)
            .field("config", &self.inner.config)
            .field("hooks", &self.inner.hooks.len())
            .finish()
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.path, f)
    }
}

fn noop_body() -> TestBody {
    Arc::new(|_ctx: TestContext| async { Ok::<(), anyhow::Error>(()) }.boxed())
}

/// Builder for root and nested test cases
///
/// # Example
///
/// ```rust,ignore
/// let test = TestCase::builder("adds numbers")
///     .timeout(Duration::from_secs(2))
///     .invocations(3)
///     .body(|_ctx| async move {
///         assert_eq!(1 + 1, 2);
///         Ok(())
///     })
///     .build("MathSpec");
/// ```
pub struct TestCaseBuilder {
    name: String,
    test_type: TestType,
    config: TestCaseConfig,
    hooks: Vec<Arc<dyn TestCaseHook>>,
    body: Option<TestBody>,
}

impl TestCaseBuilder {
    /// Create a builder for a leaf test
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test_type: TestType::Test,
            config: TestCaseConfig::default(),
            hooks: Vec::new(),
            body: None,
        }
    }

    /// Set the node kind
    pub fn test_type(mut self, test_type: TestType) -> Self {
        self.test_type = test_type;
        self
    }

    /// Declare a container
    pub fn container(self) -> Self {
        self.test_type(TestType::Container)
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: TestCaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Overall timeout for the test
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Timeout applied to each invocation
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.config.invocation_timeout = Some(timeout);
        self
    }

    /// Number of times the body runs
    pub fn invocations(mut self, invocations: usize) -> Self {
        self.config.invocations = invocations;
        self
    }

    /// Maximum number of invocations running concurrently
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Static enabled flag
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Predicate deciding enablement when the test is checked
    pub fn enabled_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TestCase) -> Enabled + Send + Sync + 'static,
    {
        self.config.enabled_if = Some(Arc::new(predicate));
        self
    }

    /// Attach a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.config.tags.insert(tag.into());
        self
    }

    /// Append a hook
    pub fn hook(mut self, hook: Arc<dyn TestCaseHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Put `hooks` in front of the hooks declared so far
    pub(crate) fn prepend_hooks(mut self, hooks: &[Arc<dyn TestCaseHook>]) -> Self {
        let declared = std::mem::take(&mut self.hooks);
        self.hooks = hooks.iter().cloned().chain(declared).collect();
        self
    }

    /// Set the body
    pub fn body<F, Fut>(mut self, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.body = Some(Arc::new(move |ctx| body(ctx).boxed()));
        self
    }

    /// Build a root test case of `spec`
    pub fn build(self, spec: impl Into<SpecId>) -> TestCase {
        TestCase {
            inner: Arc::new(TestCaseInner {
                path: TestPath::root(spec.into(), self.name),
                test_type: self.test_type,
                config: self.config,
                hooks: self.hooks,
                body: self.body.unwrap_or_else(noop_body),
                parent: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let root = TestPath::root(SpecId::from("MathSpec"), "addition");
        let child = root.child("small numbers");
        assert_eq!(child.to_string(), "MathSpec / addition -- small numbers");
        assert_eq!(child.leaf(), "small numbers");
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_path_ancestry() {
        let root = TestPath::root(SpecId::from("MathSpec"), "addition");
        let child = root.child("small");
        let grandchild = child.child("zero");
        let sibling = TestPath::root(SpecId::from("MathSpec"), "additions");

        assert!(root.is_ancestor_of(&child));
        assert!(root.is_ancestor_of(&grandchild));
        assert!(!child.is_ancestor_of(&root));
        assert!(!root.is_ancestor_of(&root));
        assert!(!sibling.is_ancestor_of(&child));
    }

    #[test]
    fn test_bang_prefix_disables() {
        let test = TestCase::builder("!skipped").build("Spec");
        let verdict = test.enabled();
        assert!(verdict.is_disabled());
        assert!(verdict.reason().unwrap_or_default().contains("bang"));
    }

    #[test]
    fn test_enabled_flag_disables() {
        let test = TestCase::builder("off").enabled(false).build("Spec");
        assert!(!test.is_active());
    }

    #[test]
    fn test_enabled_if_reason_is_kept() {
        let test = TestCase::builder("conditional")
            .enabled_if(|_| Enabled::disabled("not on this machine"))
            .build("Spec");
        assert_eq!(test.enabled().reason(), Some("not on this machine"));
    }

    #[test]
    fn test_child_inherits_disabled_parent() {
        let parent = TestCase::builder("parent")
            .container()
            .enabled(false)
            .build("Spec");
        let child = parent.child(TestCase::builder("child"));
        assert!(child.is_nested());
        let verdict = child.enabled();
        assert!(verdict.is_disabled());
        assert!(verdict
            .reason()
            .unwrap_or_default()
            .starts_with("Disabled by parent"));
    }

    #[test]
    fn test_child_inherits_tags() {
        let parent = TestCase::builder("parent")
            .container()
            .tag("slow")
            .build("Spec");
        let child = parent.child(TestCase::builder("child").tag("db"));
        assert!(child.config().tags.contains("slow"));
        assert!(child.config().tags.contains("db"));
    }

    #[test]
    fn test_container_with_invocations_is_rejected() {
        let test = TestCase::builder("parent")
            .container()
            .invocations(2)
            .build("Spec");
        assert!(matches!(
            test.check_config(),
            Err(EngineError::Configuration { .. })
        ));
    }

    #[test]
    fn test_with_config_keeps_identity() {
        let test = TestCase::builder("t").build("Spec");
        let derived = test.with_config(TestCaseConfig {
            invocations: 4,
            ..test.config().clone()
        });
        assert_eq!(test, derived);
        assert_eq!(derived.config().invocations, 4);
    }
}

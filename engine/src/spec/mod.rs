//! Specs: named collections of root tests
//!
//! A [`Spec`] owns its root tests in declaration order together with the
//! extensions and hooks that apply to every test it contains. Specs are
//! executed by a [`SpecExecutor`], which runs the spec interceptor chain
//! ([`RunIfActiveInterceptor`] outermost) before any test starts.

pub mod executor;
pub mod interceptor;
pub mod order;

pub use executor::{SpecExecutor, SpecExecutorBuilder};
pub use interceptor::{InactiveSpecListener, RunIfActiveInterceptor, SpecExecutionInterceptor, SpecNext};
pub use order::{RootTestOrder, TestCaseOrder};

use crate::error::EngineError;
use crate::extensions::{ExtensionChain, TestCaseExtension};
use crate::test_case::{TestCase, TestCaseBuilder, TestCaseHook, TestResult};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Results of one spec, keyed by test case, in completion order
pub type SpecResults = IndexMap<TestCase, TestResult>;

/// Identity of a spec
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecId(Arc<str>);

impl SpecId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpecId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for SpecId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// A spec and its root tests
pub struct Spec {
    id: SpecId,
    root_tests: Vec<TestCase>,
    extensions: ExtensionChain,
}

impl Spec {
    pub fn builder(id: impl Into<SpecId>) -> SpecBuilder {
        SpecBuilder::new(id)
    }

    pub fn id(&self) -> &SpecId {
        &self.id
    }

    /// Root tests in declaration order
    pub fn root_tests(&self) -> &[TestCase] {
        &self.root_tests
    }

    /// Extensions applied to every test of this spec, inside the registry ones
    pub fn extensions(&self) -> &ExtensionChain {
        &self.extensions
    }

    /// Reject root tests sharing a name
    ///
    /// Results are keyed by test path, so a second root with the same name
    /// would overwrite the result of the first.
    pub fn check_root_names(&self) -> Result<(), EngineError> {
        let mut seen = HashSet::with_capacity(self.root_tests.len());
        for test in &self.root_tests {
            if !seen.insert(test.path()) {
                return Err(EngineError::configuration(
                    test.path().to_string(),
                    "Duplicate test name in spec",
                ));
            }
        }
        Ok(())
    }

    /// Root tests in the order they are to be executed
    pub fn materialize_and_order_root_tests(&self, order: &RootTestOrder) -> Vec<TestCase> {
        let mut tests = self.root_tests.clone();
        order.apply(&mut tests);
        tests
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spec")
            .field("id", &self.id)
            .field("root_tests", &self.root_tests.len())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Builder for [`Spec`]
///
/// # Example
///
/// ```rust,ignore
/// let spec = Spec::builder("AccountSpec")
///     .hook(Arc::new(ResetDatabase))
///     .test(TestCase::builder("deposit").body(|_ctx| async { Ok(()) }))
///     .test(TestCase::builder("withdraw").body(|_ctx| async { Ok(()) }))
///     .build();
/// ```
pub struct SpecBuilder {
    id: SpecId,
    tests: Vec<TestCaseBuilder>,
    extensions: Vec<Arc<dyn TestCaseExtension>>,
    hooks: Vec<Arc<dyn TestCaseHook>>,
}

impl SpecBuilder {
    pub fn new(id: impl Into<SpecId>) -> Self {
        Self {
            id: id.into(),
            tests: Vec::new(),
            extensions: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Declare a root test
    pub fn test(mut self, test: TestCaseBuilder) -> Self {
        self.tests.push(test);
        self
    }

    /// Extension scoped to this spec
    pub fn extension(mut self, extension: Arc<dyn TestCaseExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Hook run around every test of this spec, before the test's own hooks
    pub fn hook(mut self, hook: Arc<dyn TestCaseHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Spec {
        let root_tests = self
            .tests
            .into_iter()
            .map(|test| test.prepend_hooks(&self.hooks).build(self.id.clone()))
            .collect();

        Spec {
            id: self.id,
            root_tests,
            extensions: ExtensionChain::new(self.extensions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    impl TestCaseHook for Marker {}

    #[test]
    fn test_spec_hooks_come_first() {
        let spec_hook: Arc<dyn TestCaseHook> = Arc::new(Marker);
        let own_hook: Arc<dyn TestCaseHook> = Arc::new(Marker);
        let spec = Spec::builder("S")
            .hook(spec_hook.clone())
            .test(TestCase::builder("t").hook(own_hook.clone()))
            .build();

        let hooks = spec.root_tests()[0].hooks();
        assert_eq!(hooks.len(), 2);
        assert!(Arc::ptr_eq(&hooks[0], &spec_hook));
        assert!(Arc::ptr_eq(&hooks[1], &own_hook));
    }

    #[test]
    fn test_root_tests_belong_to_spec() {
        let spec = Spec::builder("S").test(TestCase::builder("a")).build();
        assert_eq!(spec.root_tests()[0].spec(), spec.id());
        assert_eq!(spec.root_tests()[0].path().to_string(), "S / a");
    }

    #[test]
    fn test_duplicate_root_names_are_rejected() {
        let spec = Spec::builder("S")
            .test(TestCase::builder("a"))
            .test(TestCase::builder("b"))
            .test(TestCase::builder("a"))
            .build();

        match spec.check_root_names() {
            Err(EngineError::Configuration { test, .. }) => assert_eq!(test, "S / a"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(Spec::builder("S").test(TestCase::builder("a")).build().check_root_names().is_ok());
    }
}

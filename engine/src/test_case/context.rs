//! Handle passed into a running test body

use super::{NestedTest, TestCase, TestType};
use crate::error::EngineError;
use crate::executor::scope::TaskScope;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// Receives nested tests registered from inside a running body
#[async_trait]
pub trait NestedTestRegistrar: Send + Sync {
    /// Register (and usually execute) `nested` as a child of `parent`
    async fn register(&self, parent: &TestCase, nested: NestedTest) -> Result<(), EngineError>;
}

/// Registrar that only records the children it is given
#[derive(Default)]
pub struct CollectingRegistrar {
    registered: Mutex<Vec<TestCase>>,
}

impl CollectingRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children registered so far, in registration order
    pub fn registered(&self) -> Vec<TestCase> {
        self.registered.lock().clone()
    }
}

#[async_trait]
impl NestedTestRegistrar for CollectingRegistrar {
    async fn register(&self, parent: &TestCase, nested: NestedTest) -> Result<(), EngineError> {
        self.registered.lock().push(parent.child(nested));
        Ok(())
    }
}

/// Context of one test execution
///
/// The executor hands every invocation a context derived from the one passed
/// to [`TestExecutor::execute`](crate::TestExecutor::execute). The derived
/// context points at the execution's [`TaskScope`], so tasks spawned through
/// [`TestContext::spawn`] are awaited before the test is reported finished.
#[derive(Clone)]
pub struct TestContext {
    test_case: TestCase,
    registrar: Arc<dyn NestedTestRegistrar>,
    scope: TaskScope,
    invocation: Option<usize>,
}

impl TestContext {
    pub fn new(test_case: TestCase, registrar: Arc<dyn NestedTestRegistrar>) -> Self {
        Self {
            test_case,
            registrar,
            scope: TaskScope::new(),
            invocation: None,
        }
    }

    /// Context whose nested registrations are collected and never executed
    pub fn detached(test_case: TestCase) -> Self {
        Self::new(test_case, Arc::new(CollectingRegistrar::new()))
    }

    /// Test case being executed
    pub fn test_case(&self) -> &TestCase {
        &self.test_case
    }

    /// Zero-based index of the current invocation, when inside the body
    pub fn invocation(&self) -> Option<usize> {
        self.invocation
    }

    /// Task scope of the current execution
    pub fn scope(&self) -> &TaskScope {
        &self.scope
    }

    /// Register a nested test under the current one
    ///
    /// Only containers and dynamic tests may hold children.
    pub async fn register_test_case(&self, nested: NestedTest) -> Result<(), EngineError> {
        if self.test_case.test_type() == TestType::Test {
            return Err(EngineError::configuration(
                self.test_case.path().to_string(),
                "Cannot register nested tests inside a leaf test",
            ));
        }
        self.registrar.register(&self.test_case, nested).await
    }

    /// Spawn a child task inside the current execution's scope
    ///
    /// The test does not complete until every spawned task has finished; an
    /// error or panic in a child fails the test.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.scope.spawn(fut);
    }

    /// Derived context for `test_case` running inside `scope`
    pub(crate) fn derive(&self, test_case: TestCase, scope: TaskScope) -> Self {
        Self {
            test_case,
            registrar: self.registrar.clone(),
            scope,
            invocation: None,
        }
    }

    pub(crate) fn for_invocation(&self, invocation: usize) -> Self {
        Self {
            invocation: Some(invocation),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_leaf_rejects_nested_registration() {
        let leaf = TestCase::builder("leaf").build("Spec");
        let ctx = TestContext::detached(leaf);
        let err = ctx
            .register_test_case(TestCase::builder("child"))
            .await
            .err();
        assert!(matches!(err, Some(EngineError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_container_registers_children() {
        let registrar = Arc::new(CollectingRegistrar::new());
        let parent = TestCase::builder("parent").container().build("Spec");
        let ctx = TestContext::new(parent, registrar.clone());

        assert!(ctx.register_test_case(TestCase::builder("a")).await.is_ok());
        assert!(ctx.register_test_case(TestCase::builder("b")).await.is_ok());

        let names: Vec<String> = registrar
            .registered()
            .iter()
            .map(|t| t.path().to_string())
            .collect();
        assert_eq!(names, vec!["Spec / parent -- a", "Spec / parent -- b"]);
    }
}

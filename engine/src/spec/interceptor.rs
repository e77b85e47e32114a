// File: engine/src/spec/interceptor.rs
//
// Spec Interceptors
//
// Spec interceptors wrap the execution of a whole spec the same way test case
// extensions wrap a single test: each receives the spec and a continuation
// for the rest of the chain. The bundled RunIfActiveInterceptor sits
// outermost and short-circuits specs in which no root test is enabled.

use super::{RootTestOrder, Spec, SpecResults};
use crate::error::EngineError;
use crate::extensions::TagFilter;
use crate::listener::TestEngineListener;
use crate::status::is_enabled;
use crate::test_case::{Enabled, TestResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use std::sync::Arc;

/// Interceptor around the execution of a whole spec
#[async_trait]
pub trait SpecExecutionInterceptor: Send + Sync {
    async fn intercept(&self, spec: &Spec, next: SpecNext<'_>) -> Result<SpecResults, EngineError>;
}

/// Notified when a spec is skipped because none of its root tests is enabled
#[async_trait]
pub trait InactiveSpecListener: Send + Sync {
    async fn inactive(&self, spec: &Spec, results: &SpecResults) -> anyhow::Result<()>;
}

/// Innermost layer of a spec chain
pub(crate) trait SpecTerminal: Send + Sync {
    fn run<'s>(&'s self, spec: &'s Spec) -> BoxFuture<'s, Result<SpecResults, EngineError>>;
}

/// Continuation running the remainder of a spec interceptor chain
#[derive(Clone, Copy)]
pub struct SpecNext<'a> {
    chain: &'a [Arc<dyn SpecExecutionInterceptor>],
    terminal: &'a dyn SpecTerminal,
}

impl<'a> SpecNext<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn SpecExecutionInterceptor>], terminal: &'a dyn SpecTerminal) -> Self {
        Self { chain, terminal }
    }

    /// Run the rest of the chain for `spec`
    pub fn run<'s>(&self, spec: &'s Spec) -> BoxFuture<'s, Result<SpecResults, EngineError>>
    where
        'a: 's,
    {
        match self.chain.split_first() {
            Some((interceptor, rest)) => interceptor.intercept(spec, SpecNext::new(rest, self.terminal)),
            None => self.terminal.run(spec),
        }
    }
}

/// Runs a spec only if at least one of its root tests is enabled
///
/// When every root test is disabled, the spec is reported inactive to the
/// engine listener, each root test gets an ignored result carrying its own
/// reason, every [`InactiveSpecListener`] is invoked with those results, and
/// the rest of the chain never runs. Otherwise the rest of the chain runs
/// unconditionally.
pub struct RunIfActiveInterceptor {
    listener: Arc<dyn TestEngineListener>,
    inactive_listeners: Vec<Arc<dyn InactiveSpecListener>>,
    tags: TagFilter,
    order: RootTestOrder,
}

impl RunIfActiveInterceptor {
    pub fn new(
        listener: Arc<dyn TestEngineListener>,
        inactive_listeners: Vec<Arc<dyn InactiveSpecListener>>,
        tags: TagFilter,
        order: RootTestOrder,
    ) -> Self {
        Self {
            listener,
            inactive_listeners,
            tags,
            order,
        }
    }
}

#[async_trait]
impl SpecExecutionInterceptor for RunIfActiveInterceptor {
    async fn intercept(&self, spec: &Spec, next: SpecNext<'_>) -> Result<SpecResults, EngineError> {
        let roots = spec.materialize_and_order_root_tests(&self.order);
        let enabled: IndexMap<_, Enabled> = roots
            .into_iter()
            .map(|test_case| {
                let verdict = is_enabled(&test_case, &self.tags);
                (test_case, verdict)
            })
            .collect();
        let active = enabled.values().any(Enabled::is_enabled);

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "[SPEC] {}: active={} from {} root tests",
                spec.id(),
                active,
                enabled.len()
            );
        }

        if active {
            return next.run(spec).await;
        }

        self.listener.spec_inactive(spec.id());
        let results: SpecResults = enabled
            .into_iter()
            .map(|(test_case, verdict)| (test_case, TestResult::ignored(verdict.into_reason())))
            .collect();

        for listener in &self.inactive_listeners {
            if let Err(e) = listener.inactive(spec, &results).await {
                if log::log_enabled!(log::Level::Warn) {
                    log::warn!("[SPEC] Inactive spec listener failed for {}: {:#}", spec.id(), e);
                }
            }
        }

        Ok(results)
    }
}

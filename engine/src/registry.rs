//! Process-wide extension registry
//!
//! Assembled once before the first spec runs and shared as an `Arc`; nothing
//! is added or removed while tests execute.

use crate::extensions::{ExtensionChain, TestCaseExtension};
use crate::spec::{InactiveSpecListener, SpecExecutionInterceptor};
use std::sync::Arc;

/// Extensions, spec interceptors and inactive-spec listeners of a run
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    test_case_extensions: ExtensionChain,
    spec_interceptors: Vec<Arc<dyn SpecExecutionInterceptor>>,
    inactive_spec_listeners: Vec<Arc<dyn InactiveSpecListener>>,
}

impl ExtensionRegistry {
    pub fn builder() -> ExtensionRegistryBuilder {
        ExtensionRegistryBuilder::default()
    }

    /// Extensions wrapped around every test, outermost first
    pub fn test_case_extensions(&self) -> &ExtensionChain {
        &self.test_case_extensions
    }

    /// Interceptors wrapped around every spec, inside the active check
    pub fn spec_interceptors(&self) -> &[Arc<dyn SpecExecutionInterceptor>] {
        &self.spec_interceptors
    }

    pub fn inactive_spec_listeners(&self) -> &[Arc<dyn InactiveSpecListener>] {
        &self.inactive_spec_listeners
    }
}

/// Builder for [`ExtensionRegistry`]
#[derive(Default)]
pub struct ExtensionRegistryBuilder {
    test_case_extensions: Vec<Arc<dyn TestCaseExtension>>,
    spec_interceptors: Vec<Arc<dyn SpecExecutionInterceptor>>,
    inactive_spec_listeners: Vec<Arc<dyn InactiveSpecListener>>,
}

impl ExtensionRegistryBuilder {
    pub fn test_case_extension(mut self, extension: Arc<dyn TestCaseExtension>) -> Self {
        self.test_case_extensions.push(extension);
        self
    }

    pub fn spec_interceptor(mut self, interceptor: Arc<dyn SpecExecutionInterceptor>) -> Self {
        self.spec_interceptors.push(interceptor);
        self
    }

    pub fn inactive_spec_listener(mut self, listener: Arc<dyn InactiveSpecListener>) -> Self {
        self.inactive_spec_listeners.push(listener);
        self
    }

    pub fn build(self) -> Arc<ExtensionRegistry> {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "[REGISTRY] {} test case extensions, {} spec interceptors, {} inactive spec listeners",
                self.test_case_extensions.len(),
                self.spec_interceptors.len(),
                self.inactive_spec_listeners.len()
            );
        }
        Arc::new(ExtensionRegistry {
            test_case_extensions: ExtensionChain::new(self.test_case_extensions),
            spec_interceptors: self.spec_interceptors,
            inactive_spec_listeners: self.inactive_spec_listeners,
        })
    }
}

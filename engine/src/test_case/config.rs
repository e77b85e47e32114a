//! Per-test configuration and enablement verdicts

use super::TestCase;
use crate::config::EngineConfig;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Predicate evaluated when the engine checks whether a test may run
pub type EnabledIf = Arc<dyn Fn(&TestCase) -> Enabled + Send + Sync>;

/// Enablement verdict: a flag plus an optional reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enabled {
    enabled: bool,
    reason: Option<String>,
}

impl Enabled {
    /// The test may run
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            reason: None,
        }
    }

    /// The test must not run
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            enabled: false,
            reason: Some(reason.into()),
        }
    }

    /// Verdict from a plain boolean
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Self::enabled()
        } else {
            Self {
                enabled: false,
                reason: None,
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_disabled(&self) -> bool {
        !self.enabled
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn into_reason(self) -> Option<String> {
        self.reason
    }
}

/// Resolved configuration of one test case
#[derive(Clone)]
pub struct TestCaseConfig {
    /// Static enabled flag
    pub enabled: bool,
    /// Dynamic enablement predicate
    pub enabled_if: Option<EnabledIf>,
    /// Overall timeout; falls back to the engine default
    pub timeout: Option<Duration>,
    /// Timeout for each invocation; falls back to the engine setting, then
    /// to the overall timeout
    pub invocation_timeout: Option<Duration>,
    /// How many times the body runs
    pub invocations: usize,
    /// How many invocations may run concurrently
    pub threads: usize,
    /// Tags used by tag filtering
    pub tags: BTreeSet<String>,
}

impl TestCaseConfig {
    /// Overall timeout after applying engine defaults
    pub fn resolved_timeout(&self, engine: &EngineConfig) -> Duration {
        self.timeout.unwrap_or_else(|| engine.default_timeout())
    }

    /// Per-invocation timeout after applying engine defaults
    pub fn resolved_invocation_timeout(&self, engine: &EngineConfig) -> Duration {
        self.invocation_timeout
            .or_else(|| engine.invocation_timeout())
            .unwrap_or_else(|| self.resolved_timeout(engine))
    }
}

impl Default for TestCaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enabled_if: None,
            timeout: None,
            invocation_timeout: None,
            invocations: 1,
            threads: 1,
            tags: BTreeSet::new(),
        }
    }
}

impl fmt::Debug for TestCaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCaseConfig")
            .field("enabled", &self.enabled)
            .field("enabled_if", &self.enabled_if.is_some())
            .field("timeout", &self.timeout)
            .field("invocation_timeout", &self.invocation_timeout)
            .field("invocations", &self.invocations)
            .field("threads", &self.threads)
            .field("tags", &self.tags)
            .finish()
    }
}

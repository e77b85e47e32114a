//! Tag based filtering

use super::{Next, TestCaseExtension};
use crate::error::EngineError;
use crate::test_case::{Enabled, TestCase, TestResult};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Include / exclude rule over test tags
///
/// A test is excluded when it carries any excluded tag, or when an include
/// set is configured and the test carries none of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl TagFilter {
    pub fn new(include: BTreeSet<String>, exclude: BTreeSet<String>) -> Self {
        Self { include, exclude }
    }

    /// Only tests carrying `tag` (or another included tag) pass
    pub fn include(mut self, tag: impl Into<String>) -> Self {
        self.include.insert(tag.into());
        self
    }

    /// Tests carrying `tag` never pass
    pub fn exclude(mut self, tag: impl Into<String>) -> Self {
        self.exclude.insert(tag.into());
        self
    }

    /// Whether the filter accepts everything
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn verdict(&self, test_case: &TestCase) -> Enabled {
        let tags = &test_case.config().tags;

        if let Some(tag) = tags.intersection(&self.exclude).next() {
            return Enabled::disabled(format!(
                "{} is excluded by tag filter (tag '{}')",
                test_case.path(),
                tag
            ));
        }
        if !self.include.is_empty() && tags.is_disjoint(&self.include) {
            return Enabled::disabled(format!(
                "{} is excluded by tag filter (none of {:?})",
                test_case.path(),
                self.include
            ));
        }
        Enabled::enabled()
    }
}

/// Skips tests rejected by a [`TagFilter`] without running the rest of the chain
pub struct TagFilterExtension {
    filter: TagFilter,
}

impl TagFilterExtension {
    pub fn new(filter: TagFilter) -> Self {
        Self { filter }
    }
}

#[async_trait]
impl TestCaseExtension for TagFilterExtension {
    async fn intercept(&self, test_case: TestCase, next: Next<'_>) -> Result<TestResult, EngineError> {
        let verdict = self.filter.verdict(&test_case);
        if verdict.is_disabled() {
            if log::log_enabled!(log::Level::Debug) {
                log::debug!("[TAGS] Skipping {}", test_case.path());
            }
            return Ok(TestResult::ignored(verdict.into_reason()));
        }
        next.run(test_case).await
    }
}

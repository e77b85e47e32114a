//! Enablement of a test case at engine level

use crate::extensions::TagFilter;
use crate::test_case::{Enabled, TestCase};

/// Whether `test_case` may run under `tags`
///
/// The rules carried by the test itself are checked first (see
/// [`TestCase::enabled`]), then the engine tag filter.
pub fn is_enabled(test_case: &TestCase, tags: &TagFilter) -> Enabled {
    let own = test_case.enabled();
    if own.is_disabled() {
        return own;
    }
    tags.verdict(test_case)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_rules_come_first() {
        let filter = TagFilter::default().exclude("slow");
        let test = TestCase::builder("!flaky").tag("slow").build("Spec");
        let verdict = is_enabled(&test, &filter);
        assert!(verdict.reason().unwrap_or_default().contains("bang"));
    }

    #[test]
    fn test_tag_filter_applies_to_enabled_tests() {
        let filter = TagFilter::default().exclude("slow");
        let test = TestCase::builder("big").tag("slow").build("Spec");
        assert!(is_enabled(&test, &filter).is_disabled());
        assert!(is_enabled(&TestCase::builder("small").build("Spec"), &filter).is_enabled());
    }
}

// File: engine/src/config.rs
//
// Engine Configuration
//
// Process-wide settings read once before the first spec runs. Loaded from
// YAML, then optionally overridden from SPINDLE_* environment variables.

use crate::extensions::TagFilter;
use crate::spec::TestCaseOrder;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Default overall timeout of a test (10 minutes)
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;

/// Environment variable overriding `default_timeout_ms`
pub const ENV_TIMEOUT_MS: &str = "SPINDLE_TIMEOUT_MS";
/// Environment variable overriding `invocation_timeout_ms`
pub const ENV_INVOCATION_TIMEOUT_MS: &str = "SPINDLE_INVOCATION_TIMEOUT_MS";
/// Environment variable overriding `seed` (decimal or 0x-prefixed hex)
pub const ENV_SEED: &str = "SPINDLE_SEED";
/// Environment variable overriding `include_tags` (comma separated)
pub const ENV_INCLUDE_TAGS: &str = "SPINDLE_INCLUDE_TAGS";
/// Environment variable overriding `exclude_tags` (comma separated)
pub const ENV_EXCLUDE_TAGS: &str = "SPINDLE_EXCLUDE_TAGS";

/// Engine-wide configuration
///
/// # Example
///
/// ```yaml
/// default_timeout_ms: 30000
/// invocation_timeout_ms: 5000
/// test_case_order: random
/// seed: 42
/// exclude_tags: ["slow"]
/// interrupt_on_timeout: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Overall timeout for tests without their own
    pub default_timeout_ms: u64,
    /// Per-invocation timeout for tests without their own
    pub invocation_timeout_ms: Option<u64>,
    /// Order of root tests inside a spec
    pub test_case_order: TestCaseOrder,
    /// Seed for random ordering; drawn at startup when absent
    pub seed: Option<u64>,
    /// When non-empty, only tests carrying one of these tags run
    pub include_tags: BTreeSet<String>,
    /// Tests carrying any of these tags never run
    pub exclude_tags: BTreeSet<String>,
    /// Drop timed-out work instead of letting it finish in the background
    pub interrupt_on_timeout: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            invocation_timeout_ms: None,
            test_case_order: TestCaseOrder::Sequential,
            seed: None,
            include_tags: BTreeSet::new(),
            exclude_tags: BTreeSet::new(),
            interrupt_on_timeout: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml).context("Failed to parse engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine configuration {}", path.display()))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("Invalid engine configuration {}", path.display()))
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == 0 {
            anyhow::bail!("default_timeout_ms must be greater than zero");
        }
        if self.invocation_timeout_ms == Some(0) {
            anyhow::bail!("invocation_timeout_ms must be greater than zero");
        }
        if let Some(tag) = self.include_tags.intersection(&self.exclude_tags).next() {
            anyhow::bail!("Tag '{}' is both included and excluded", tag);
        }
        Ok(())
    }

    /// Apply `SPINDLE_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.default_timeout_ms = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_TIMEOUT_MS, value))?;
        }
        if let Some(value) = lookup(ENV_INVOCATION_TIMEOUT_MS) {
            self.invocation_timeout_ms = Some(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid {}: {}", ENV_INVOCATION_TIMEOUT_MS, value))?,
            );
        }
        if let Some(value) = lookup(ENV_SEED) {
            self.seed = Some(parse_seed(&value).with_context(|| format!("Invalid {}: {}", ENV_SEED, value))?);
        }
        if let Some(value) = lookup(ENV_INCLUDE_TAGS) {
            self.include_tags = parse_tags(&value);
        }
        if let Some(value) = lookup(ENV_EXCLUDE_TAGS) {
            self.exclude_tags = parse_tags(&value);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout_ms.map(Duration::from_millis)
    }

    /// Tag filter described by `include_tags` / `exclude_tags`
    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::new(self.include_tags.clone(), self.exclude_tags.clone())
    }
}

fn parse_seed(value: &str) -> Result<u64> {
    let value = value.trim();
    let seed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => value.parse()?,
    };
    Ok(seed)
}

fn parse_tags(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_timeout(), Duration::from_secs(600));
        assert_eq!(config.invocation_timeout(), None);
        assert_eq!(config.test_case_order, TestCaseOrder::Sequential);
        assert!(config.interrupt_on_timeout);
    }

    #[test]
    fn test_parse_yaml() {
        let config = EngineConfig::from_yaml_str(
            r#"
default_timeout_ms: 30000
invocation_timeout_ms: 500
test_case_order: lexicographic
exclude_tags: ["slow", "db"]
interrupt_on_timeout: false
"#,
        )
        .expect("valid config");

        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert_eq!(config.invocation_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.test_case_order, TestCaseOrder::Lexicographic);
        assert!(config.exclude_tags.contains("db"));
        assert!(!config.interrupt_on_timeout);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(EngineConfig::from_yaml_str("timeout: 5").is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        assert!(EngineConfig::from_yaml_str("default_timeout_ms: 0").is_err());
    }

    #[test]
    fn test_overlapping_tags_are_rejected() {
        let yaml = "include_tags: [fast]\nexclude_tags: [fast]\n";
        assert!(EngineConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "seed: 7").expect("write");

        let config = EngineConfig::load(file.path()).expect("load");
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_TIMEOUT_MS, "1500"),
            (ENV_SEED, "0xff"),
            (ENV_INCLUDE_TAGS, "fast, unit ,"),
        ]);
        let config = EngineConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .expect("overrides");

        assert_eq!(config.default_timeout(), Duration::from_millis(1500));
        assert_eq!(config.seed, Some(255));
        assert_eq!(
            config.include_tags.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["fast", "unit"]
        );
    }

    #[test]
    fn test_invalid_override_is_reported() {
        let result = EngineConfig::default().with_overrides(|key| (key == ENV_TIMEOUT_MS).then(|| "soon".to_string()));
        assert!(result.is_err());
    }
}

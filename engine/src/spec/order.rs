//! Ordering of root tests

use crate::config::EngineConfig;
use crate::test_case::TestCase;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Order in which the root tests of a spec are executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TestCaseOrder {
    /// Declaration order
    #[default]
    Sequential,
    /// Sorted by name
    Lexicographic,
    /// Shuffled with a seeded generator
    Random,
}

/// Ordering resolved for a whole run
///
/// The seed is fixed once, so every spec of a run is shuffled reproducibly
/// and a failing run can be replayed with the logged seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootTestOrder {
    pub order: TestCaseOrder,
    pub seed: u64,
}

impl RootTestOrder {
    pub fn new(order: TestCaseOrder, seed: u64) -> Self {
        Self { order, seed }
    }

    /// Take order and seed from `config`, drawing a seed when none is set
    pub fn from_config(config: &EngineConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        if config.test_case_order == TestCaseOrder::Random && log::log_enabled!(log::Level::Info) {
            log::info!("[ORDER] Random test order with seed {:#x}", seed);
        }
        Self::new(config.test_case_order, seed)
    }

    /// Reorder `tests` in place
    pub fn apply(&self, tests: &mut [TestCase]) {
        match self.order {
            TestCaseOrder::Sequential => {}
            TestCaseOrder::Lexicographic => tests.sort_by(|a, b| a.name().cmp(b.name())),
            TestCaseOrder::Random => {
                let mut rng = StdRng::seed_from_u64(self.seed);
                tests.shuffle(&mut rng);
            }
        }
    }
}

impl Default for RootTestOrder {
    fn default() -> Self {
        Self::new(TestCaseOrder::Sequential, 0)
    }
}

//! # Spindle Engine
//!
//! Test-execution engine: runs a tree of declared test cases, each exactly
//! once, honoring enablement rules, timeouts, repeated invocations,
//! before/after hooks and a chain of pluggable interceptors, and produces a
//! success / failure / error / ignored result for every node.
//!
//! ## Architecture Overview
//!
//! ```text
//! SpecExecutor
//!   └─ spec interceptors (RunIfActiveInterceptor outermost)
//!        └─ for each root test: TestExecutor
//!             └─ test case extensions (first registered outermost)
//!                  └─ active check → hooks → body (replayed) → hooks
//!                       └─ TimeoutExecutionContext
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spindle_engine::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_spec_runs() {
//!     let spec = Spec::builder("MathSpec")
//!         .test(TestCase::builder("adds").body(|_ctx| async {
//!             anyhow::ensure!(1 + 1 == 2);
//!             Ok(())
//!         }))
//!         .build();
//!
//!     let results = SpecExecutor::builder().build().execute(&spec).await.unwrap();
//!     assert!(results.values().all(TestResult::is_success));
//! }
//! ```
//!
//! ## Error Model
//!
//! - [`EngineError`]: validation and configuration problems; fatal, returned
//!   as `Err` before any hook runs.
//! - [`TestError`]: everything a test can do wrong (assertion, panic,
//!   timeout, cancellation, any other error); captured inside [`TestResult`].

#![warn(clippy::all)]

/// Engine configuration (YAML + environment overrides)
pub mod config;

pub mod error;

/// Single test execution: timeouts, replay, task scopes, cancellation
pub mod executor;

/// Test case extension chain and the bundled extensions
pub mod extensions;

pub mod listener;

/// Clock abstraction
pub mod orchestrator;

pub mod registry;

/// Specs, spec interceptors and the spec executor
pub mod spec;

pub mod status;

/// Test case model
pub mod test_case;

// Convenient re-exports for common usage
pub mod prelude;

pub use config::EngineConfig;
pub use error::{EngineError, TestError};
pub use executor::{CancellationToken, TaskScope, TestExecutor, TestExecutorBuilder};
pub use extensions::{ExtensionChain, Next, TestCaseExtension};
pub use listener::{TestEngineListener, TestExecutionListener};
pub use orchestrator::{Clock, PausedClock, SystemClock, TimeMark};
pub use registry::ExtensionRegistry;
pub use spec::{Spec, SpecExecutor, SpecId, SpecResults};
pub use test_case::{TestCase, TestCaseConfig, TestContext, TestResult, TestStatus, TestType};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

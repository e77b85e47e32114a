// File: engine/src/orchestrator/mod.rs
//
// Orchestrator Module
//
// Time-related plumbing shared by the executor and the timeout strategies.

/// Clock abstractions and monotonic time marks
pub mod clock;

pub use clock::{Clock, PausedClock, SystemClock, TimeMark};

//! Structured task scope for one test execution
//!
//! The executor opens a scope before the body runs and joins it before the
//! result is built. Tasks spawned from the body (and tasks those tasks spawn
//! through a cloned context) all land in the same scope.

use crate::error::{catch_panic, join_error, TestError};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};

#[derive(Default)]
struct ScopeState {
    /// Tasks not yet joined, in spawn order
    pending: Vec<JoinHandle<Result<(), TestError>>>,
    /// Every task spawned since the last complete join, for abort
    spawned: Vec<AbortHandle>,
}

/// Group of child tasks owned by one test execution
#[derive(Clone, Default)]
pub struct TaskScope {
    state: Arc<Mutex<ScopeState>>,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a child task in this scope
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handle = tokio::spawn(catch_panic(fut));
        let mut state = self.state.lock();
        state.spawned.push(handle.abort_handle());
        state.pending.push(handle);
    }

    /// Number of spawned tasks not yet joined
    pub fn outstanding(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Wait for every task, including ones spawned while waiting
    ///
    /// Returns the error of the earliest spawned task that failed.
    pub async fn join_all(&self) -> Result<(), TestError> {
        let mut first = Ok(());
        loop {
            let batch = {
                let mut state = self.state.lock();
                if state.pending.is_empty() {
                    // everything spawned so far has been joined
                    state.spawned.clear();
                    break;
                }
                std::mem::take(&mut state.pending)
            };

            if log::log_enabled!(log::Level::Trace) {
                log::trace!("[SCOPE] Joining {} child task(s)", batch.len());
            }

            for handle in batch {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(join_error(e)),
                };
                if first.is_ok() {
                    first = outcome;
                }
            }
        }
        first
    }

    /// Abort every task spawned in this scope
    pub fn abort_all(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        for handle in state.spawned.drain(..) {
            handle.abort();
        }
    }
}

//! Cancellation of an in-flight run

use std::sync::Arc;
use tokio::sync::watch;

/// Shared flag that cancels running test bodies
///
/// Cancelling does not tear down the executor: the body in flight is
/// abandoned, then the after-test hooks run with
/// [`TestError::Cancelled`](crate::TestError::Cancelled) as the result so far.
#[derive(Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        if log::log_enabled!(log::Level::Debug) && !self.is_cancelled() {
            log::debug!("[CANCEL] Cancellation requested");
        }
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once cancellation has been requested
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // the sender lives as long as `self`, so this never happens
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

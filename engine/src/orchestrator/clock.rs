// File: engine/src/orchestrator/clock.rs
//
// Clock Abstraction
//
// Every duration the engine reports and every deadline it enforces goes
// through the Clock trait, so tests can run against tokio's paused time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::{self, Duration, Instant};

/// Clock abstraction trait
///
/// The executor reads the current instant from the clock when it starts a
/// [`TimeMark`] and the timeout strategies race work against
/// [`Clock::sleep`]. Injecting the clock keeps both deterministic under
/// `#[tokio::test(start_paused = true)]`.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use tokio::time::Duration;
/// use spindle_engine::orchestrator::{Clock, SystemClock};
///
/// #[tokio::main]
/// async fn main() {
///     let clock: Arc<dyn Clock> = Arc::new(SystemClock);
///     let start = clock.now();
///     clock.sleep(Duration::from_millis(100)).await;
///     assert!(clock.now() - start >= Duration::from_millis(100));
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current instant in time
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration
    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// System clock backed by tokio's time driver
///
/// When the runtime is started with paused time this clock follows the paused
/// time as well, since it reads `tokio::time::Instant`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

/// Paused clock for manual time control
///
/// [`PausedClock::new`] pauses the tokio clock, so it must not be combined
/// with `#[tokio::test(start_paused = true)]` (tokio refuses to pause twice).
/// Use [`SystemClock`] in paused-runtime tests instead.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use tokio::time::Duration;
/// use spindle_engine::orchestrator::{Clock, PausedClock};
///
/// #[tokio::test]
/// async fn test_timeout_logic() {
///     let clock = Arc::new(PausedClock::new());
///     let start = clock.now();
///
///     clock.advance(Duration::from_secs(5)).await;
///     assert_eq!(clock.now() - start, Duration::from_secs(5));
/// }
/// ```
pub struct PausedClock;

impl PausedClock {
    /// Creates a new PausedClock and pauses tokio time
    pub fn new() -> Self {
        time::pause();
        Self
    }

    /// Manually advance time by the specified duration
    ///
    /// Pending sleeps that expire during the advancement are woken up.
    pub async fn advance(&self, d: Duration) {
        time::advance(d).await
    }
}

impl Clock for PausedClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

impl Default for PausedClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic start marker for one test execution
///
/// Taken once when the executor starts a test; every result variant computes
/// its duration from the same mark.
#[derive(Clone)]
pub struct TimeMark {
    clock: Arc<dyn Clock>,
    start: Instant,
}

impl TimeMark {
    /// Mark the current instant of `clock`
    pub fn now(clock: Arc<dyn Clock>) -> Self {
        let start = clock.now();
        Self { clock, start }
    }

    /// Time elapsed since the mark was taken
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.start)
    }
}

impl std::fmt::Debug for TimeMark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeMark").field("start", &self.start).finish()
    }
}

//! The suspended-delay collaborator used between retries.
//!
//! Like [`crate::id`], this is an injected collaborator rather than core
//! engine surface. [`SystemClock`] is the unsurprising default; tests
//! substitute a clock that does not actually sleep so retry-heavy scenarios
//! run instantly.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_std::task;

/// A suspended delay between retry attempts.
pub trait Clock: Send + Sync {
    /// Suspends the calling task for `duration`.
    fn delay(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// A [`Clock`] backed by the `async-std` executor's real-time sleep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn delay(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(task::sleep(duration))
    }
}

/// A [`Clock`] that returns immediately, recording how long it was asked to
/// wait. Used by the test suite to exercise retry/backoff logic without
/// paying real wall-clock time.
#[derive(Debug, Default)]
pub struct ImmediateClock {
    /// Every duration a caller has asked this clock to delay for, in order.
    pub delays: async_std::sync::Mutex<Vec<Duration>>,
}

impl Clock for ImmediateClock {
    fn delay(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.delays.lock().await.push(duration);
        })
    }
}

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Clock driving the polling loops
#[async_trait]
pub trait Timer: Send + Sync + Debug {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend for the given duration
    async fn sleep(&self, duration: Duration);
}

/// [`Timer`] backed by the tokio runtime clock
///
/// Under a paused runtime (`tokio::time::pause`) the clock only moves when
/// every task is idle, which makes polling loops deterministic in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

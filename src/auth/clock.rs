//! Wall-clock source and waiting primitive used by the session manager.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Time source for expiry checks and poll spacing.
///
/// Expiry arithmetic uses UTC timestamps so validity survives restarts.
/// Tests swap in a clock whose `sleep` advances virtual time instantly.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

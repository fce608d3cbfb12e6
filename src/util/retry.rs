//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::auth::clock::Clock;
use crate::auth::error::AuthError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Execute an async operation, retrying transient failures.
    ///
    /// Only errors for which [`AuthError::is_retryable`] holds are retried;
    /// waits go through `clock` so callers control how time passes.
    pub async fn execute<F, Fut, T>(&self, clock: &dyn Clock, mut operation: F) -> Result<T, AuthError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let mut backoff = self.initial_backoff;
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() || attempt + 1 >= max_attempts {
                        return Err(e);
                    }

                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Retrying after error"
                    );

                    // Jitter only stretches the wait: 100% to 125% of backoff, capped.
                    let jitter_factor = 1.0 + (rand_factor() * 0.25);
                    let wait = (backoff.as_secs_f64() * jitter_factor)
                        .min(self.max_backoff.as_secs_f64());
                    clock.sleep(Duration::from_secs_f64(wait)).await;

                    backoff = Duration::from_secs_f64(
                        (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
                    );
                    attempt += 1;
                }
            }
        }
    }
}

/// Simple pseudo-random factor [0, 1) without pulling in rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    let hash = hasher.finish();
    (hash % 10000) as f64 / 10000.0
}

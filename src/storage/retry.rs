use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Errors that know whether repeating the request can help
pub trait Transient: Display {
    fn is_transient(&self) -> bool;
}

/// Retry configuration with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self {
            max_retries: 1,
            ..Default::default()
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        delay
            .mul_f64(self.backoff_factor.max(1.0))
            .min(Duration::from_millis(self.max_delay_ms))
    }

    /// Run `request` until it succeeds, fails permanently, or runs out of attempts
    ///
    /// `max_retries` is the total number of attempts; zero is treated as one.
    pub async fn execute<F, Fut, T, E>(&self, mut request: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient,
    {
        let attempts = self.max_retries.max(1);
        let mut delay = Duration::from_millis(self.initial_delay_ms);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match request().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                tracing::debug!(attempt, error = %err, "Permanent failure, not retrying");
                return Err(err);
            }
            if attempt >= attempts {
                tracing::warn!(attempts, error = %err, "Giving up after repeated failures");
                return Err(err);
            }

            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Request failed, backing off"
            );
            sleep(delay).await;
            delay = self.next_delay(delay);
        }
    }
}

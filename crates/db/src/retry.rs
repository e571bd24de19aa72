//! Backoff helpers.
//!
//! `with_retry` re-runs a database operation when SQLite reports the file as
//! busy or locked, which happens when a burst of votes lands on the single
//! writer. `exponential_delay` is shared with the outbox worker, which
//! reschedules failed pushes on the same curve.

use std::future::Future;
use std::time::Duration;

use sqlx::Error as SqlxError;

/// `base * 2^attempt`, capped at `max`. Saturates instead of overflowing.
pub fn exponential_delay(base: Duration, attempt: u32, max: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

/// Configuration for SQLite retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction (0.0 to 1.0) of the delay added as random jitter.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(1),
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let delay = exponential_delay(self.base_delay, attempt, self.max_delay);
        if self.jitter_factor <= 0.0 {
            return delay;
        }
        let jitter_range = (delay.as_millis() as f64 * self.jitter_factor) as u64;
        if jitter_range == 0 {
            return delay;
        }
        // v4 uuids are random; the low bits are good enough for jitter.
        let random = uuid::Uuid::new_v4().as_u128() as u64;
        delay + Duration::from_millis(random % jitter_range)
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), plus their extended codes.
pub fn is_retryable_error(e: &SqlxError) -> bool {
    let SqlxError::Database(db_err) = e else {
        return false;
    };
    match db_err.code() {
        Some(code) => code
            .parse::<u32>()
            .map(|n| matches!(n & 0xFF, 5 | 6))
            .unwrap_or(false),
        None => db_err.message().contains("database is locked"),
    }
}

/// Run `f`, retrying on transient SQLite contention errors.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, SqlxError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SqlxError>>,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if is_retryable_error(&e) && attempt < config.max_retries => {
                let delay = config.delay_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = ?e,
                    "SQLite busy, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

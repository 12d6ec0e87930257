//! Retry logic with bounded exponential backoff for capability calls.
//!
//! Retries transient `ServiceError`s (timeouts, backend hiccups) and gives up
//! after `max_attempts`; the caller then aborts the turn and rolls back.

use colloquy_core::{RetrySettings, ServiceError};
use std::time::Duration;

/// Execute an async capability operation with retry.
///
/// The `operation` closure is called repeatedly until it succeeds, returns a
/// non-transient error, or `max_attempts` is exhausted.
pub async fn with_retry<T, F, Fut>(
    settings: &RetrySettings,
    what: &str,
    operation: F,
) -> Result<T, ServiceError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let mut delay = Duration::from_millis(settings.initial_delay_ms);
    let max_delay = Duration::from_millis(settings.max_delay_ms);
    let mut last_error = None;

    for attempt in 1..=settings.max_attempts.max(1) {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", what, attempt);
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "{} failed on attempt {}/{}: {}",
                    what,
                    attempt,
                    settings.max_attempts,
                    e
                );
                last_error = Some(e);
            }
        }

        if attempt < settings.max_attempts {
            tokio::time::sleep(delay).await;
            delay = Duration::from_secs_f64(
                (delay.as_secs_f64() * settings.backoff_factor).min(max_delay.as_secs_f64()),
            );
        }
    }

    Err(last_error.unwrap_or_else(|| ServiceError::Timeout(format!("{}: no attempts made", what))))
}

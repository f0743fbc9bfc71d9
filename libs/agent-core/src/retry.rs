//! Backoff schedule for transient model-request failures

use crate::types::RetryConfig;
use std::time::Duration;

/// Exponential backoff for the given attempt number (1-based), capped at the
/// configured maximum.
pub fn exponential_backoff_ms(config: &RetryConfig, attempt: usize) -> u64 {
    let exponent = attempt.saturating_sub(1) as i32;
    let backoff = config.initial_backoff_ms as f64 * config.multiplier.powi(exponent);
    (backoff as u64).min(config.max_backoff_ms)
}

/// Backoff with +/-25% jitter so concurrent sessions do not retry in
/// lockstep.
pub fn jittered_backoff(config: &RetryConfig, attempt: usize) -> Duration {
    let base = exponential_backoff_ms(config, attempt) as f64;
    let factor = 0.75 + rand::random::<f64>() * 0.5;
    Duration::from_millis((base * factor) as u64)
}

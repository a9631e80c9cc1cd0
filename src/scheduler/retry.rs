//! Retry budget per failure kind and exponential backoff.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::models::FailureKind;

/// Retries allowed after the first attempt for a failure of `kind`.
pub fn retry_budget(config: &RetryConfig, kind: FailureKind) -> u32 {
    match kind {
        FailureKind::NetworkError | FailureKind::HttpError | FailureKind::Blocked => {
            config.max_retries
        }
        FailureKind::Timeout => config.max_retries.min(1),
        FailureKind::ChallengeUnresolved | FailureKind::ParseError => 0,
    }
}

/// `base × 2^attempt`, capped at `max_delay_ms`, plus up to `jitter_ms`.
pub fn backoff_delay<R: Rng + ?Sized>(config: &RetryConfig, attempt: u32, rng: &mut R) -> Duration {
    let exp = 2u64.saturating_pow(attempt.min(32));
    let delay = config
        .base_delay_ms
        .saturating_mul(exp)
        .min(config.max_delay_ms);
    let jitter = if config.jitter_ms > 0 {
        rng.gen_range(0..=config.jitter_ms)
    } else {
        0
    };
    Duration::from_millis(delay + jitter)
}

//! Reconnect delay policy: exponential growth from one second, capped at one
//! minute, plus up to 25% random jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before the first reconnect, before jitter.
pub const BASE_DELAY_MS: u64 = 1_000;

/// Upper bound on the un-jittered delay.
pub const MAX_DELAY_MS: u64 = 60_000;

/// Jitter is drawn uniformly from `[0, base * JITTER_RATIO]`.
pub const JITTER_RATIO: f64 = 0.25;

/// Un-jittered delay for `attempt` (0-based), in milliseconds.
pub fn base_delay_ms(attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    BASE_DELAY_MS.saturating_mul(factor).min(MAX_DELAY_MS)
}

/// Delay to wait before reconnect `attempt` (0-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    backoff_delay_with(attempt, &mut rand::rng())
}

/// [`backoff_delay`] with a caller-supplied random source.
pub fn backoff_delay_with<R: Rng>(attempt: u32, rng: &mut R) -> Duration {
    let base = base_delay_ms(attempt) as f64;
    let jitter = rng.random_range(0.0..=base * JITTER_RATIO);
    Duration::from_millis((base + jitter).floor() as u64)
}

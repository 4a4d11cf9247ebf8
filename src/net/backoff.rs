//! Exponential backoff with jitter for accept errors.

use std::time::Duration;
use rand::Rng;

/// Delay before retrying `accept` after `attempt` consecutive failures.
///
/// Doubles from `base` up to `max`, plus up to 10% jitter.
pub fn accept_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow((attempt - 1).min(16));
    let capped = base.saturating_mul(factor).min(max);

    let jitter_range = capped.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped + Duration::from_millis(jitter)
}

/// Spread `base` by ±10% so connections opened together do not age out together.
pub fn jittered(base: Duration) -> Duration {
    let spread = base.as_millis() as u64 / 10;
    if spread == 0 {
        return base;
    }
    let offset = rand::thread_rng().gen_range(0..=spread * 2);
    (base + Duration::from_millis(offset)).saturating_sub(Duration::from_millis(spread))
}

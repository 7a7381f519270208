//! Reconnect delay calculation

use rand::Rng;
use std::time::Duration;

/// Lower bound of the jitter factor
pub const JITTER_MIN: f64 = 0.75;
/// Upper bound of the jitter factor
pub const JITTER_MAX: f64 = 1.25;

/// Delay before reconnect number `attempt` (0-based).
///
/// `base * 2^attempt`, scaled by a uniform factor in `[0.75, 1.25]`, then
/// clamped to `cap`.
pub fn compute_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    compute_delay_with(attempt, base, cap, &mut rand::thread_rng())
}

/// [`compute_delay`] with a caller-supplied random source
pub fn compute_delay_with<R: Rng + ?Sized>(
    attempt: u32,
    base: Duration,
    cap: Duration,
    rng: &mut R,
) -> Duration {
    // 2^1023 is the largest finite power; the cap takes over long before
    let exponential = base.as_secs_f64() * 2f64.powi(attempt.min(1023) as i32);
    let jittered = exponential * rng.gen_range(JITTER_MIN..=JITTER_MAX);
    Duration::from_secs_f64(jittered.min(cap.as_secs_f64()))
}

//! Failure backoff schedule.

use std::time::Duration;

use rand::Rng;

const BASE_DELAY: Duration = Duration::from_secs(5);

/// Five minutes. Past this, longer waits only delay recovery of a
/// camera that has come back.
const MAX_DELAY: Duration = Duration::from_secs(300);

/// Delay before the next capture attempt after `failures` consecutive
/// failures: `min(5s * 2^failures + jitter, 300s)` with up to one second
/// of uniform jitter so co-located instances never retry in lockstep.
///
/// The first failure waits ~10s; growth is exponential and the cap is
/// hard, so the jitter never pushes a delay past five minutes.
pub fn backoff_delay(failures: u32) -> Duration {
    // 2^10 * 5s already exceeds the cap; clamping keeps the shift sound
    // for arbitrarily large failure counts.
    let exponent = failures.min(10);
    let scaled = BASE_DELAY * (1u32 << exponent);
    let jitter = Duration::from_secs_f64(rand::rng().random_range(0.0..1.0));
    (scaled + jitter).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_waits_about_ten_seconds() {
        let delay = backoff_delay(1);
        assert!(delay >= Duration::from_secs(10));
        assert!(delay < Duration::from_secs(11));
    }

    #[test]
    fn third_failure_waits_about_forty_seconds() {
        let delay = backoff_delay(3);
        assert!(delay >= Duration::from_secs(40));
        assert!(delay < Duration::from_secs(41));
    }

    #[test]
    fn schedule_is_monotone_up_to_the_cap() {
        for failures in 1..=20u32 {
            let floor = Duration::from_secs(5 * (1u64 << failures.min(10)));
            let delay = backoff_delay(failures);
            if floor >= MAX_DELAY {
                assert_eq!(delay, MAX_DELAY, "capped at {failures} failures");
            } else {
                assert!(delay >= floor, "floor violated at {failures} failures");
                assert!(delay < floor + Duration::from_secs(1));
            }
        }
    }

    #[test]
    fn cap_holds_for_large_failure_counts() {
        assert_eq!(backoff_delay(6), MAX_DELAY);
        assert_eq!(backoff_delay(100), MAX_DELAY);
        assert_eq!(backoff_delay(u32::MAX), MAX_DELAY);
    }
}

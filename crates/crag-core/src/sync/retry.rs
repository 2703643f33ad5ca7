//! Delay between failed sync attempts.

use std::time::Duration;

const BASE_DELAY_SECONDS: u64 = 5;
const MAX_EXPONENT: u32 = 8;

/// Exponential backoff in seconds with cap.
pub const fn backoff_seconds(consecutive_failures: u32) -> u64 {
    let exponent = if consecutive_failures > MAX_EXPONENT {
        MAX_EXPONENT
    } else {
        consecutive_failures
    };
    BASE_DELAY_SECONDS << exponent
}

pub const fn backoff_delay(consecutive_failures: u32) -> Duration {
    Duration::from_secs(backoff_seconds(consecutive_failures))
}

///
/// Wait timeouts.
///
/// Every blocking operation takes a timeout in milliseconds. `0` polls
/// without blocking and `WAIT_INFINITE` blocks until the condition holds.
///

use std::time::{Duration, Instant};

pub const WAIT_INFINITE: u32 = u32::MAX;

/// Converts a millisecond timeout to an absolute deadline.
/// Returns `None` for `WAIT_INFINITE`.
pub fn deadline_after(timeout_ms: u32) -> Option<Instant> {
    if timeout_ms == WAIT_INFINITE {
        None
    } else {
        Some(Instant::now() + Duration::from_millis(u64::from(timeout_ms)))
    }
}

//! Wall-clock helper for message timestamps (spec.md §3's `timestamp_ms`).
//! The scheduler itself is timed with [`std::time::Instant`] (monotonic,
//! immune to clock adjustment); this millisecond-since-epoch value is only
//! for the payload field consumers read, not for scheduling order.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

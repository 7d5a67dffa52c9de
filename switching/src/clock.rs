// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Monotonic nanosecond clock backing learning-table timestamps.

use once_cell::sync::Lazy;
use std::time::Instant;

static ANCHOR: Lazy<Instant> = Lazy::new(Instant::now);

/// Nanoseconds elapsed on the monotonic clock since the first call in this
/// process. Never affected by wall-clock adjustments.
#[must_use]
pub fn now_ns() -> u64 {
    #[allow(clippy::cast_possible_truncation)] // ~584 years of uptime fit in u64
    {
        ANCHOR.elapsed().as_nanos() as u64
    }
}

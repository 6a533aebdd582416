/*
 *   Copyright (c) 2024 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Network throughput tracking: total bytes received, plus an instantaneous and a
//! trailing-average speed.
//!
//! Mirrors the cumulative-counter-plus-last-sample-timestamp approach used
//! throughout the engine (see [`crate::event_pairs`]) rather than a windowed ring
//! buffer: the instantaneous figure only needs one anchor point, not a history.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// How far back the instantaneous-speed anchor is allowed to drift before
/// `record` rolls it forward to the current sample.
const INSTANTANEOUS_WINDOW_MS: u64 = 1000;

#[derive(Debug, Default)]
struct NetworkStatsInner {
    total_bytes: AtomicU64,
    // Anchor for the instantaneous-speed window: the total-bytes/timestamp pair
    // observed the last time the window rolled over.
    last_sample_ms: AtomicU64,
    last_sample_bytes: AtomicU64,
    first_sample_ms: AtomicU64,
    has_first_sample: AtomicBool,
    shut_down: AtomicBool,
}

/// Cheaply cloneable handle onto one shared counter set.
#[derive(Debug, Clone, Default)]
pub struct NetworkStatsKeeper {
    inner: Arc<NetworkStatsInner>,
}

/// A human-scaled `(value, unit)` pair, e.g. `(3.2, "MB")`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ByteRate {
    pub value: f64,
    pub unit: &'static str,
}

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

fn humanize(bytes_per_sec: f64) -> ByteRate {
    if bytes_per_sec <= 0.0 {
        return ByteRate {
            value: 0.0,
            unit: "B",
        };
    }
    let mut value = bytes_per_sec;
    let mut unit_index = 0;
    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }
    ByteRate {
        value,
        unit: UNITS[unit_index],
    }
}

impl NetworkStatsKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `bytes` more have been received, as of `now_ms`. Once
    /// [`Self::shutdown`] is called, further samples are ignored — mirrors the
    /// "shutdown-of-stats" behavior in §4.F, where the line freezes once the network
    /// phase is known to be over.
    pub fn record(&self, bytes: u64, now_ms: u64) {
        if self.inner.shut_down.load(Ordering::Relaxed) {
            return;
        }
        self.inner.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        if !self.inner.has_first_sample.swap(true, Ordering::Relaxed) {
            self.inner.first_sample_ms.store(now_ms, Ordering::Relaxed);
            self.inner.last_sample_ms.store(now_ms, Ordering::Relaxed);
            self.inner.last_sample_bytes.store(0, Ordering::Relaxed);
        }

        let window_start = self.inner.last_sample_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(window_start) >= INSTANTANEOUS_WINDOW_MS {
            self.inner.last_sample_ms.store(now_ms, Ordering::Relaxed);
            self.inner
                .last_sample_bytes
                .store(self.inner.total_bytes.load(Ordering::Relaxed), Ordering::Relaxed);
        }
    }

    /// Freezes the counters: subsequent [`Self::record`] calls are no-ops. Mirrors
    /// the teacher's one-shot `close()` idempotency pattern.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Relaxed);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.inner.total_bytes.load(Ordering::Relaxed)
    }

    /// Average speed across the whole observed window, in bytes/sec.
    pub fn average_bytes_per_sec(&self, now_ms: u64) -> f64 {
        if !self.inner.has_first_sample.load(Ordering::Relaxed) {
            return 0.0;
        }
        let first = self.inner.first_sample_ms.load(Ordering::Relaxed);
        let elapsed_ms = now_ms.saturating_sub(first).max(1);
        self.total_bytes() as f64 * 1000.0 / elapsed_ms as f64
    }

    pub fn average_rate(&self, now_ms: u64) -> ByteRate {
        humanize(self.average_bytes_per_sec(now_ms))
    }

    /// Speed over the current window only (bytes since the window anchor rolled
    /// over, divided by the time since then), in bytes/sec. Distinct from
    /// [`Self::average_bytes_per_sec`], which divides by the whole run.
    pub fn instantaneous_bytes_per_sec(&self, now_ms: u64) -> f64 {
        if !self.inner.has_first_sample.load(Ordering::Relaxed) {
            return 0.0;
        }
        let window_start_ms = self.inner.last_sample_ms.load(Ordering::Relaxed);
        let window_start_bytes = self.inner.last_sample_bytes.load(Ordering::Relaxed);
        let elapsed_ms = now_ms.saturating_sub(window_start_ms).max(1);
        let bytes_in_window = self.total_bytes().saturating_sub(window_start_bytes);
        bytes_in_window as f64 * 1000.0 / elapsed_ms as f64
    }

    pub fn instantaneous_rate(&self, now_ms: u64) -> ByteRate {
        humanize(self.instantaneous_bytes_per_sec(now_ms))
    }

    /// Human-readable total-received figure, e.g. `(12.4, "MB")`.
    pub fn total_rate(&self) -> ByteRate {
        humanize(self.total_bytes() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_accumulate() {
        let keeper = NetworkStatsKeeper::new();
        keeper.record(1024, 0);
        keeper.record(1024, 1000);
        assert_eq!(keeper.total_bytes(), 2048);
    }

    #[test]
    fn shutdown_freezes_counters() {
        let keeper = NetworkStatsKeeper::new();
        keeper.record(1024, 0);
        keeper.shutdown();
        keeper.record(1024, 1000);
        assert_eq!(keeper.total_bytes(), 1024);
        assert!(keeper.is_shut_down());
    }

    #[test]
    fn average_speed_uses_whole_window() {
        let keeper = NetworkStatsKeeper::new();
        keeper.record(1024 * 10, 0);
        // 10 KiB over 1 second -> 10 KB/s average.
        let avg = keeper.average_bytes_per_sec(1000);
        assert!((avg - 10240.0).abs() < 1.0);
    }

    #[test]
    fn instantaneous_speed_tracks_the_current_window_not_the_whole_run() {
        let keeper = NetworkStatsKeeper::new();
        keeper.record(1024, 0);
        // A slow trickle long before now shouldn't inflate the instantaneous figure.
        keeper.record(1024 * 50, 900);
        let instantaneous = keeper.instantaneous_bytes_per_sec(900);
        let average = keeper.average_bytes_per_sec(900);
        assert!((instantaneous - average).abs() < 1.0);

        // Once the window rolls over (>= 1000ms since the anchor), a burst only
        // counts the bytes received since the new anchor.
        keeper.record(1024 * 5, 1100);
        let instantaneous = keeper.instantaneous_bytes_per_sec(1200);
        // Window anchor reset at t=1100 with total_bytes already including the
        // burst; 100ms later with no further bytes, the window shows ~0 B/s.
        assert!(instantaneous < average);
    }

    #[test]
    fn humanizes_into_kb_and_mb() {
        let rate = humanize(1536.0);
        assert_eq!(rate.unit, "KB");
        assert!((rate.value - 1.5).abs() < 0.001);

        let rate = humanize(1024.0 * 1024.0 * 2.0);
        assert_eq!(rate.unit, "MB");
        assert!((rate.value - 2.0).abs() < 0.001);
    }

    #[test]
    fn zero_bytes_humanizes_to_zero_b() {
        let rate = humanize(0.0);
        assert_eq!(rate.unit, "B");
        assert_eq!(rate.value, 0.0);
    }
}

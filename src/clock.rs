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

//! Monotonic time source and elapsed-time formatting.
//!
//! Dependency-injected like the teacher crate's `SafeRawTerminal` / `PinnedInputStream`
//! fields: production code uses [`SystemClock`], tests use [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Supplies the current time, in milliseconds, on a monotonic (not wall-clock)
/// timeline. Only differences between two calls are meaningful.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Real clock, anchored to an `Instant` captured at construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Test clock whose value is advanced explicitly. Cloning shares the same counter,
/// mirroring how `SharedWriter` clones share one channel.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.millis.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.millis.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Locale hook for numeric/time formatting (§6). Only the decimal separator is
/// parametrized today; this is the seam a real locale table would hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    pub decimal_separator: char,
}

impl Locale {
    pub const EN_US: Locale = Locale {
        decimal_separator: '.',
    };
}

impl Default for Locale {
    fn default() -> Self {
        Self::EN_US
    }
}

/// Formats an elapsed duration, in milliseconds, as seconds with one decimal digit,
/// e.g. `12345 -> "12.3s"`.
pub fn format_elapsed_ms(elapsed_ms: u64, locale: Locale) -> String {
    let whole_secs = elapsed_ms / 1000;
    let tenths = (elapsed_ms % 1000) / 100;
    let mut out = format!("{whole_secs}");
    out.push(locale.decimal_separator);
    out.push_str(&tenths.to_string());
    out.push('s');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_one_decimal() {
        assert_eq!(format_elapsed_ms(12345, Locale::EN_US), "12.3s");
        assert_eq!(format_elapsed_ms(1000, Locale::EN_US), "1.0s");
        assert_eq!(format_elapsed_ms(0, Locale::EN_US), "0.0s");
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_ms(), 100);
        clock.advance(50);
        assert_eq!(clock.now_ms(), 150);
        clock.set(0);
        assert_eq!(clock.now_ms(), 0);
    }
}

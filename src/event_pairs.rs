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

//! Pairs start/finish events by correlation key and sums non-overlapping intervals.
//!
//! `UNFINISHED_EVENT_PAIR` sentinels from the source are replaced here with an
//! explicit option type: a pair is either [`EventPair::Complete`]-able (has
//! `end_time`) or still ongoing.

use crate::types::EventKey;
use dashmap::DashMap;
use std::sync::Arc;

/// A single timed span, keyed externally by [`EventKey`]. Once `end_time` is set it
/// never changes back to `None` -- that invariant is enforced by
/// [`EventPairTracker::on_finish`], which only ever replaces a `None` with a `Some`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventPair {
    pub start_time: u64,
    pub end_time: Option<u64>,
}

impl EventPair {
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Result of [`elapsed`]: total time accounted for by completed, de-overlapped
/// spans, plus how long the earliest still-ongoing span has been running (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Elapsed {
    pub completed_ms: u64,
    pub currently_running_ms: Option<u64>,
}

/// Concurrent key -> [`EventPair`] map. Sharded internally by `dashmap`, so
/// concurrent inserts from different ingestion threads don't serialize on one lock.
pub type PhaseMap = DashMap<EventKey, EventPair>;

/// Owns a [`PhaseMap`] and the two mutation entry points a dispatcher subscription
/// calls. Cheaply cloneable (an `Arc` around the map) so every subscription closure
/// can hold its own handle.
#[derive(Debug, Clone, Default)]
pub struct EventPairTracker {
    pairs: Arc<PhaseMap>,
}

impl EventPairTracker {
    pub fn new() -> Self {
        Self {
            pairs: Arc::new(DashMap::new()),
        }
    }

    pub fn pairs(&self) -> &PhaseMap {
        &self.pairs
    }

    /// Records a start. Tolerates a finish that already arrived first (out-of-order
    /// delivery): in that case the existing `end_time` is preserved.
    pub fn on_start(&self, key: EventKey, start_time: u64) {
        self.pairs
            .entry(key)
            .and_modify(|pair| pair.start_time = start_time)
            .or_insert(EventPair {
                start_time,
                end_time: None,
            });
    }

    /// Records a finish. Tolerates a finish that arrives before any start was seen.
    pub fn on_finish(&self, key: EventKey, end_time: u64) {
        self.pairs
            .entry(key)
            .and_modify(|pair| pair.end_time = Some(end_time))
            .or_insert(EventPair {
                start_time: end_time,
                end_time: Some(end_time),
            });
    }
}

/// Sums the union of complete, non-zero-length intervals in `pairs` (no double
/// counting of overlapping work), and reports how long the earliest ongoing span
/// has been running relative to `now`.
pub fn elapsed(pairs: &PhaseMap, now: u64) -> Elapsed {
    let mut intervals: Vec<(u64, u64)> = pairs
        .iter()
        .filter_map(|entry| {
            let pair = *entry.value();
            pair.end_time
                .filter(|end| *end > pair.start_time)
                .map(|end| (pair.start_time, end))
        })
        .collect();
    intervals.sort_unstable_by_key(|(start, _)| *start);

    let mut completed_ms: u64 = 0;
    let mut cursor: Option<(u64, u64)> = None;
    for (start, end) in intervals {
        cursor = Some(match cursor {
            None => (start, end),
            Some((cur_start, cur_end)) => {
                if start <= cur_end {
                    (cur_start, cur_end.max(end))
                } else {
                    completed_ms += cur_end - cur_start;
                    (start, end)
                }
            }
        });
    }
    if let Some((start, end)) = cursor {
        completed_ms += end - start;
    }

    // The earliest ongoing start, per the design-note correction: track the minimum
    // start among pairs with no end_time, not the start of whichever pair happens to
    // be visited last.
    let earliest_ongoing_start = pairs
        .iter()
        .filter(|entry| entry.value().end_time.is_none())
        .map(|entry| entry.value().start_time)
        .min();

    Elapsed {
        completed_ms,
        currently_running_ms: earliest_ongoing_start.map(|start| now.saturating_sub(start)),
    }
}

/// Merges the union of a slice of already-clipped [`EventPair`]s into a single
/// millisecond total. Shares the sweep-line merge in [`elapsed`], factored out so
/// the frame composer can combine proxy pairs drawn from more than one [`PhaseMap`]
/// (e.g. parse + action-graph clipped to a build window) without re-inserting them
/// into a shared map first.
pub fn union_ms(pairs: &[EventPair]) -> u64 {
    let mut intervals: Vec<(u64, u64)> = pairs
        .iter()
        .filter_map(|pair| pair.end_time.filter(|end| *end > pair.start_time).map(|end| (pair.start_time, end)))
        .collect();
    intervals.sort_unstable_by_key(|(start, _)| *start);

    let mut total_ms: u64 = 0;
    let mut cursor: Option<(u64, u64)> = None;
    for (start, end) in intervals {
        cursor = Some(match cursor {
            None => (start, end),
            Some((cur_start, cur_end)) => {
                if start <= cur_end {
                    (cur_start, cur_end.max(end))
                } else {
                    total_ms += cur_end - cur_start;
                    (start, end)
                }
            }
        });
    }
    if let Some((start, end)) = cursor {
        total_ms += end - start;
    }
    total_ms
}

/// [`elapsed`], but over several [`PhaseMap`]s treated as one combined timeline
/// (e.g. "processing" = parse pairs ∪ action-graph pairs).
pub fn elapsed_combined(maps: &[&PhaseMap], now: u64) -> Elapsed {
    let intervals: Vec<EventPair> = maps
        .iter()
        .flat_map(|map| map.iter().map(|entry| *entry.value()))
        .collect();
    let completed_ms = union_ms(&intervals);

    let earliest_ongoing_start = maps
        .iter()
        .flat_map(|map| map.iter().filter(|entry| entry.value().end_time.is_none()).map(|entry| entry.value().start_time).collect::<Vec<_>>())
        .min();

    Elapsed {
        completed_ms,
        currently_running_ms: earliest_ongoing_start.map(|start| now.saturating_sub(start)),
    }
}

/// Whether any map in `maps` has ever recorded a pair (started or complete).
pub fn any_started(maps: &[&PhaseMap]) -> bool {
    maps.iter().any(|map| !map.is_empty())
}

/// Returns proxy pairs clipped to `[start, end]`. Per the design-level intent (both
/// ends are clamped symmetrically, `max(start, s)` / `min(end, e)`), ongoing pairs
/// are proxied to `(max(start, s), end)` rather than leaking their unclamped start.
pub fn between(start: u64, end: u64, pairs: &PhaseMap) -> Vec<EventPair> {
    pairs
        .iter()
        .filter_map(|entry| {
            let pair = *entry.value();
            let pair_end = pair.end_time.unwrap_or(end);
            // Only intervals that actually overlap the window survive.
            if pair.start_time > end || pair_end < start {
                return None;
            }
            let proxied_start = pair.start_time.max(start);
            let proxied_end = pair_end.min(end);
            Some(EventPair {
                start_time: proxied_start,
                end_time: Some(proxied_end),
            })
        })
        .collect()
}

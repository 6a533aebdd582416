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

//! Renders the current set of active workers into a capped list of status lines.
//!
//! Mirrors the teacher's `spinner_render` module's "redraw what changed, nothing
//! more" philosophy, but for a list of workers rather than a single spinner frame.

use crate::clock::{format_elapsed_ms, Locale};
use crate::worker_activity::{ActivitySlot, LeafEvent, WorkerActivityMap};
use std::collections::HashMap;

/// How a worker's elapsed time is computed: the renderer doesn't know the
/// accounting rules (event-pair merging lives in [`crate::event_pairs`]), it only
/// needs a number per worker.
pub type WorkerElapsedMs = HashMap<crate::types::WorkerId, u64>;

#[derive(Debug, Clone, Copy)]
pub struct ThreadRenderPolicy {
    pub max_lines: usize,
    pub always_sort_by_time: bool,
}

/// Renders the active workers for `slot` into display lines, per §4.J.
pub fn render_thread_lines(
    activity: &WorkerActivityMap,
    slot: ActivitySlot,
    elapsed_by_worker: &WorkerElapsedMs,
    policy: ThreadRenderPolicy,
    locale: Locale,
) -> Vec<String> {
    let mut workers = activity.snapshot(slot);
    let thread_count = workers.len();
    if thread_count == 0 {
        return Vec::new();
    }

    let compressing = thread_count > policy.max_lines;
    let sort_by_time = policy.always_sort_by_time || compressing;

    if sort_by_time {
        workers.sort_by(|(worker_a, _), (worker_b, _)| {
            let time_a = elapsed_by_worker.get(worker_a).copied().unwrap_or(0);
            let time_b = elapsed_by_worker.get(worker_b).copied().unwrap_or(0);
            time_b.cmp(&time_a)
        });
    } else {
        workers.sort_by_key(|(worker_id, _)| *worker_id);
    }

    if !compressing {
        return workers
            .iter()
            .map(|(worker_id, leaf_event)| full_line(*worker_id, leaf_event, elapsed_by_worker, locale))
            .collect();
    }

    if policy.max_lines == 0 {
        return vec![compressed_line(&workers)];
    }

    let full_count = policy.max_lines.saturating_sub(1);
    let mut lines: Vec<String> = workers[..full_count]
        .iter()
        .map(|(worker_id, leaf_event)| full_line(*worker_id, leaf_event, elapsed_by_worker, locale))
        .collect();
    lines.push(compressed_line(&workers[full_count..]));
    lines
}

fn full_line(
    worker_id: crate::types::WorkerId,
    leaf_event: &LeafEvent,
    elapsed_by_worker: &WorkerElapsedMs,
    locale: Locale,
) -> String {
    let elapsed_ms = elapsed_by_worker.get(&worker_id).copied().unwrap_or(0);
    format!(
        "  {} {}",
        format_elapsed_ms(elapsed_ms, locale),
        leaf_event.description()
    )
}

fn compressed_line(remaining: &[(crate::types::WorkerId, LeafEvent)]) -> String {
    if remaining.is_empty() {
        return String::new();
    }
    if remaining.len() == 1 {
        // max_lines == 1: no full lines at all, just the compressed summary.
        let tokens: Vec<String> = remaining
            .iter()
            .map(|(_, leaf_event)| leaf_event.short_token())
            .collect();
        return format!(" |=> {} THREADS: {}", remaining.len(), tokens.join(" "));
    }
    let tokens: Vec<String> = remaining
        .iter()
        .map(|(_, leaf_event)| leaf_event.short_token())
        .collect();
    format!(
        " |=> {} MORE THREADS: {}",
        remaining.len(),
        tokens.join(" ")
    )
}

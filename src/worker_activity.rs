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

//! Records what each worker is currently doing.
//!
//! A worker has up to three simultaneous activity slots: a "step" slot (which also
//! carries cache-op and compression leaf events -- they're all just different
//! flavors of "the thing this worker is doing right now"), a test-summary slot, and
//! a test-status-message slot. Each slot is its own concurrent map so that e.g. a
//! test-status message doesn't clobber the step a worker was also reporting.

use crate::types::WorkerId;
use dashmap::DashMap;
use std::sync::Arc;

/// The innermost current activity of a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafEvent {
    Step { name: String, start_time: u64 },
    CacheOp { description: String, start_time: u64 },
    Compression { start_time: u64 },
    TestSummary { test_name: String, start_time: u64 },
    TestStatusMessage { message: String, start_time: u64 },
}

impl LeafEvent {
    pub fn start_time(&self) -> u64 {
        match self {
            LeafEvent::Step { start_time, .. }
            | LeafEvent::CacheOp { start_time, .. }
            | LeafEvent::Compression { start_time }
            | LeafEvent::TestSummary { start_time, .. }
            | LeafEvent::TestStatusMessage { start_time, .. } => *start_time,
        }
    }

    /// Full-width description used on a worker's own status line.
    pub fn description(&self) -> String {
        match self {
            LeafEvent::Step { name, .. } => name.clone(),
            LeafEvent::CacheOp { description, .. } => description.clone(),
            LeafEvent::Compression { .. } => "COMPRESSING".to_string(),
            LeafEvent::TestSummary { test_name, .. } => test_name.clone(),
            LeafEvent::TestStatusMessage { message, .. } => message.clone(),
        }
    }

    /// Compact token used in the "N MORE THREADS" compressed line.
    pub fn short_token(&self) -> String {
        match self {
            LeafEvent::Step { name, .. } => name.clone(),
            LeafEvent::CacheOp { .. } => "CACHE".to_string(),
            LeafEvent::Compression { .. } => "COMPRESS".to_string(),
            LeafEvent::TestSummary { test_name, .. } => test_name.clone(),
            LeafEvent::TestStatusMessage { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySlot {
    Step,
    TestSummary,
    TestStatusMessage,
}

fn hinted_capacity() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Three independent `worker_id -> Option<LeafEvent>` maps, one per slot.
#[derive(Debug, Clone)]
pub struct WorkerActivityMap {
    step: Arc<DashMap<WorkerId, LeafEvent>>,
    test_summary: Arc<DashMap<WorkerId, LeafEvent>>,
    test_status_message: Arc<DashMap<WorkerId, LeafEvent>>,
}

impl Default for WorkerActivityMap {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerActivityMap {
    pub fn new() -> Self {
        let capacity = hinted_capacity();
        Self {
            step: Arc::new(DashMap::with_capacity(capacity)),
            test_summary: Arc::new(DashMap::with_capacity(capacity)),
            test_status_message: Arc::new(DashMap::with_capacity(capacity)),
        }
    }

    fn slot(&self, slot: ActivitySlot) -> &DashMap<WorkerId, LeafEvent> {
        match slot {
            ActivitySlot::Step => &self.step,
            ActivitySlot::TestSummary => &self.test_summary,
            ActivitySlot::TestStatusMessage => &self.test_status_message,
        }
    }

    /// A start event sets the slot; `None` means the slot is now empty (a finish).
    pub fn set(&self, slot: ActivitySlot, worker_id: WorkerId, leaf_event: Option<LeafEvent>) {
        match leaf_event {
            Some(leaf_event) => {
                self.slot(slot).insert(worker_id, leaf_event);
            }
            None => {
                self.slot(slot).remove(&worker_id);
            }
        }
    }

    /// Snapshot of currently-active `(worker_id, leaf_event)` pairs for one slot, in
    /// arbitrary order. Callers that need a stable order re-sort this themselves
    /// (see [`crate::thread_renderer`]).
    pub fn snapshot(&self, slot: ActivitySlot) -> Vec<(WorkerId, LeafEvent)> {
        self.slot(slot)
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn is_empty(&self, slot: ActivitySlot) -> bool {
        self.slot(slot).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn start_then_finish_clears_slot() {
        let map = WorkerActivityMap::new();
        let worker = WorkerId(1);
        map.set(
            ActivitySlot::Step,
            worker,
            Some(LeafEvent::Step {
                name: "//foo:bar".into(),
                start_time: 0,
            }),
        );
        assert_eq!(map.snapshot(ActivitySlot::Step).len(), 1);
        map.set(ActivitySlot::Step, worker, None);
        assert!(map.is_empty(ActivitySlot::Step));
    }

    #[test]
    fn slots_are_independent() {
        let map = WorkerActivityMap::new();
        let worker = WorkerId(1);
        map.set(
            ActivitySlot::Step,
            worker,
            Some(LeafEvent::Step {
                name: "step".into(),
                start_time: 0,
            }),
        );
        map.set(
            ActivitySlot::TestStatusMessage,
            worker,
            Some(LeafEvent::TestStatusMessage {
                message: "running setup".into(),
                start_time: 0,
            }),
        );
        assert_eq!(map.snapshot(ActivitySlot::Step).len(), 1);
        assert_eq!(map.snapshot(ActivitySlot::TestStatusMessage).len(), 1);
        assert!(map.is_empty(ActivitySlot::TestSummary));
    }
}

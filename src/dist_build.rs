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

//! Latest-wins snapshot of a distributed build's remote status.
//!
//! A single slot rather than a history: each `DistBuildStatusUpdate` fully replaces
//! the previous snapshot, per §3 ("the latest replaces the prior"). Guarded the same
//! way as the test aggregator's two builders (`Safe*`-style `std::sync::Mutex`)
//! since updates are infrequent compared to rule/step events.

use crate::types::DistBuildStatus;
use std::sync::{Arc, Mutex as StdMutex};

#[derive(Debug, Clone, Default)]
pub struct DistBuildStatusCell {
    latest: Arc<StdMutex<Option<DistBuildStatus>>>,
}

impl DistBuildStatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, status: DistBuildStatus) {
        let mut guard = self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(status);
    }

    pub fn get(&self) -> Option<DistBuildStatus> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_distributed(&self) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DistBuildState;
    use pretty_assertions::assert_eq;

    #[test]
    fn not_distributed_until_first_update() {
        let cell = DistBuildStatusCell::new();
        assert!(!cell.is_distributed());
    }

    #[test]
    fn latest_update_replaces_prior() {
        let cell = DistBuildStatusCell::new();
        cell.set(DistBuildStatus {
            state: DistBuildState::Queued,
            eta_ms: None,
            message: None,
            log_book: Vec::new(),
        });
        cell.set(DistBuildStatus {
            state: DistBuildState::Running,
            eta_ms: Some(1000),
            message: None,
            log_book: Vec::new(),
        });
        assert_eq!(cell.get().unwrap().state, DistBuildState::Running);
    }
}

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

//! Fractional progress for parse, project-generation, and build phases.
//!
//! An optional collaborator, not a required dependency of the rest of the engine --
//! mirrors the teacher's `OutputDevice` trait, a narrow seam the frame composer
//! queries without caring which concrete implementation is behind it.

use crate::types::DistBuildStatus;

/// Supplies progress fractions, in `[0, 1]`, for the three phases the frame
/// composer can render a progress indicator for. `None` means "unknown", and the
/// composer falls back to a spinner/elapsed-time-only line instead of a bar.
pub trait ProgressEstimator: Send + Sync {
    fn parse_progress(&self) -> Option<f64>;
    fn project_gen_progress(&self) -> Option<f64>;
    fn build_progress(&self) -> Option<f64>;
}

/// No-op estimator: always unknown. Used when no external progress source is wired
/// up, so the composer always falls back to elapsed-time display.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressEstimator;

impl ProgressEstimator for NullProgressEstimator {
    fn parse_progress(&self) -> Option<f64> {
        None
    }

    fn project_gen_progress(&self) -> Option<f64> {
        None
    }

    fn build_progress(&self) -> Option<f64> {
        None
    }
}

/// Derives local build-progress from a distributed build's latest ETA report:
/// `elapsed / (elapsed + eta)`. Clamped to `[0, 1]` since a stale ETA can make the
/// raw ratio overshoot once the remote side is running later than predicted.
pub fn build_progress_from_dist_status(status: &DistBuildStatus, elapsed_ms: u64) -> Option<f64> {
    let eta_ms = status.eta_ms?;
    let denominator = elapsed_ms + eta_ms;
    if denominator == 0 {
        return Some(0.0);
    }
    Some((elapsed_ms as f64 / denominator as f64).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DistBuildState;
    use pretty_assertions::assert_eq;

    fn status(eta_ms: Option<u64>) -> DistBuildStatus {
        DistBuildStatus {
            state: DistBuildState::Running,
            eta_ms,
            message: None,
            log_book: Vec::new(),
        }
    }

    #[test]
    fn no_eta_means_unknown_progress() {
        assert_eq!(build_progress_from_dist_status(&status(None), 1000), None);
    }

    #[test]
    fn halfway_when_elapsed_equals_eta() {
        let progress = build_progress_from_dist_status(&status(Some(1000)), 1000).unwrap();
        assert!((progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn progress_never_exceeds_one() {
        let progress = build_progress_from_dist_status(&status(Some(1)), 1_000_000).unwrap();
        assert!(progress <= 1.0);
    }

    #[test]
    fn null_estimator_is_always_unknown() {
        let estimator = NullProgressEstimator;
        assert_eq!(estimator.parse_progress(), None);
        assert_eq!(estimator.project_gen_progress(), None);
        assert_eq!(estimator.build_progress(), None);
    }
}

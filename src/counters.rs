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

//! Atomic counters for rules, cache outcomes, tests, and uploads.
//!
//! Incremented from any ingestion thread, read (relaxed -- display only) from the
//! render thread.

use crate::types::{CacheResultKind, RuleStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct CountersInner {
    rules_completed: AtomicU64,
    rules_updated: AtomicU64,
    cache_hit: AtomicU64,
    cache_miss: AtomicU64,
    cache_error: AtomicU64,
    cache_ignored: AtomicU64,
    cache_local_key_unchanged_hit: AtomicU64,
    test_pass: AtomicU64,
    test_fail: AtomicU64,
    test_skip: AtomicU64,
    http_uploads_scheduled: AtomicU64,
    http_uploads_started: AtomicU64,
    http_uploads_done: AtomicU64,
    http_uploads_failed: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct Counters {
    inner: Arc<CountersInner>,
}

macro_rules! counter_accessor {
    ($field:ident) => {
        pub fn $field(&self) -> u64 {
            self.inner.$field.load(Ordering::Relaxed)
        }
    };
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    counter_accessor!(rules_completed);
    counter_accessor!(rules_updated);
    counter_accessor!(cache_hit);
    counter_accessor!(cache_miss);
    counter_accessor!(cache_error);
    counter_accessor!(cache_ignored);
    counter_accessor!(cache_local_key_unchanged_hit);
    counter_accessor!(test_pass);
    counter_accessor!(test_fail);
    counter_accessor!(test_skip);
    counter_accessor!(http_uploads_scheduled);
    counter_accessor!(http_uploads_started);
    counter_accessor!(http_uploads_done);
    counter_accessor!(http_uploads_failed);

    /// Folds a rule-finish event into the counters, per §4.E: only a `Success`
    /// status participates in the cache-outcome tally, and `rules_updated` excludes
    /// only the local-key-unchanged-hit case.
    pub fn on_rule_finished(&self, status: RuleStatus, cache_result: Option<CacheResultKind>) {
        self.inner.rules_completed.fetch_add(1, Ordering::Relaxed);

        if status != RuleStatus::Success {
            return;
        }

        let Some(cache_result) = cache_result else {
            return;
        };

        match cache_result {
            CacheResultKind::Miss => {
                self.inner.cache_miss.fetch_add(1, Ordering::Relaxed);
            }
            CacheResultKind::Error => {
                self.inner.cache_error.fetch_add(1, Ordering::Relaxed);
            }
            CacheResultKind::Hit => {
                self.inner.cache_hit.fetch_add(1, Ordering::Relaxed);
            }
            CacheResultKind::Ignored => {
                self.inner.cache_ignored.fetch_add(1, Ordering::Relaxed);
            }
            CacheResultKind::LocalKeyUnchangedHit => {
                self.inner
                    .cache_local_key_unchanged_hit
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        if cache_result != CacheResultKind::LocalKeyUnchangedHit {
            self.inner.rules_updated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn on_test_finished(&self, outcome: crate::types::TestOutcome) {
        use crate::types::TestOutcome;
        match outcome {
            TestOutcome::Pass => self.inner.test_pass.fetch_add(1, Ordering::Relaxed),
            TestOutcome::Fail => self.inner.test_fail.fetch_add(1, Ordering::Relaxed),
            TestOutcome::Skip => self.inner.test_skip.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn on_http_upload_scheduled(&self) {
        self.inner
            .http_uploads_scheduled
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_http_upload_started(&self) {
        self.inner
            .http_uploads_started
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_http_upload_finished(&self, success: bool) {
        if success {
            self.inner.http_uploads_done.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner
                .http_uploads_failed
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Jobs summary, per §4.K: `"N/M JOBS, K UPDATED, X [p%] CACHE MISS[, Y [q%]
    /// CACHE ERRORS]"`. Cache-miss percentage is normalized against the *total*
    /// rule count (not completed rules) so that hits -- which short-circuit whole
    /// subtrees and are structurally undercounted -- don't bias the percentage;
    /// cache-error percentage is normalized against `rules_updated`.
    pub fn jobs_summary(&self, rule_count: u64) -> String {
        let completed = self.rules_completed();
        let updated = self.rules_updated();
        let miss = self.cache_miss();
        let error = self.cache_error();

        let miss_pct = if rule_count > 0 {
            100.0 * miss as f64 / rule_count as f64
        } else {
            0.0
        };

        let mut summary = format!(
            "{completed}/{rule_count} JOBS, {updated} UPDATED, {miss} [{miss_pct:.1}%] CACHE MISS"
        );

        if error > 0 {
            let error_pct = if updated > 0 {
                100.0 * error as f64 / updated as f64
            } else {
                0.0
            };
            summary.push_str(&format!(", {error} [{error_pct:.1}%] CACHE ERRORS"));
        }

        summary
    }
}

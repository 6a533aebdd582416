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

//! Test-run aggregation: pass/fail/skip counting, the accumulated text report, and
//! the final stdout dump.
//!
//! The report and status-message buffers are guarded by a plain `std::sync::Mutex`
//! rather than `dashmap`, per the `Safe*` naming convention the teacher crate uses
//! for its coarse-grained shared state (`SafeHistory`, `SafeLineState` in
//! `terminal_async::lib`): these two buffers are append-only text, built up across
//! many small writes, so a lock-free map buys nothing here.

use crate::counters::Counters;
use crate::error::{DashboardError, DashboardResult};
use crate::types::{TestOutcome, TestResult};
use crate::worker_activity::{ActivitySlot, LeafEvent, WorkerActivityMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

pub type SafeString = Arc<StdMutex<String>>;

fn append_line(buffer: &SafeString, line: &str) {
    let mut guard = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if !guard.is_empty() {
        guard.push('\n');
    }
    guard.push_str(line);
}

/// Tracks whether a `TestRunStarted`/`TestRunFinished` has already been observed.
/// A second `TestRunStarted` for the same run is a contract violation: the upstream
/// event source is expected to emit exactly one start and one finish per run.
#[derive(Debug, Default)]
struct RunLatch {
    started: AtomicBool,
    finished: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct TestAggregator {
    counters: Counters,
    activity: WorkerActivityMap,
    report: SafeString,
    status_messages: SafeString,
    run_latch: Arc<RunLatch>,
}

impl TestAggregator {
    pub fn new(counters: Counters, activity: WorkerActivityMap) -> Self {
        Self {
            counters,
            activity,
            report: Arc::new(StdMutex::new(String::new())),
            status_messages: Arc::new(StdMutex::new(String::new())),
            run_latch: Arc::new(RunLatch::default()),
        }
    }

    pub fn is_started(&self) -> bool {
        self.run_latch.started.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.run_latch.finished.load(Ordering::SeqCst)
    }

    /// `TestRunStarted`: CAS-stores the run as started (a second start is fatal),
    /// then appends a header line per test name to the report buffer.
    pub fn on_test_run_started(&self, test_names: &[String]) -> DashboardResult<()> {
        if self
            .run_latch
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DashboardError::ContractViolation(
                "TestRunStarted observed twice for the same run".to_string(),
            ));
        }
        for name in test_names {
            append_line(&self.report, &format!("RUNNING {name}"));
        }
        Ok(())
    }

    pub fn on_test_summary_started(&self, worker: crate::types::WorkerId, test_name: &str, start_time: u64) {
        self.activity.set(
            ActivitySlot::TestSummary,
            worker,
            Some(LeafEvent::TestSummary {
                test_name: test_name.to_string(),
                start_time,
            }),
        );
    }

    /// `TestSummaryFinished`: clears the worker's test-summary slot, tallies the
    /// outcome, and on FAIL enqueues a synthesized failure log line via `log_send`.
    pub fn on_test_summary_finished(
        &self,
        worker: crate::types::WorkerId,
        test_name: &str,
        outcome: TestOutcome,
        test_case: Option<&str>,
        message: Option<&str>,
        log_send: impl FnOnce(String),
    ) {
        self.activity.set(ActivitySlot::TestSummary, worker, None);
        self.counters.on_test_finished(outcome);

        if outcome == TestOutcome::Fail {
            let case = test_case.unwrap_or("<unknown case>");
            let msg = message.unwrap_or("<no message>");
            log_send(format!("FAILURE {case} {test_name}: {msg}"));
        }
    }

    pub fn on_test_status_message_started(
        &self,
        worker: crate::types::WorkerId,
        message: &str,
        start_time: u64,
    ) {
        self.activity.set(
            ActivitySlot::TestStatusMessage,
            worker,
            Some(LeafEvent::TestStatusMessage {
                message: message.to_string(),
                start_time,
            }),
        );
        append_line(&self.status_messages, message);
    }

    pub fn on_test_status_message_finished(&self, worker: crate::types::WorkerId) {
        self.activity.set(ActivitySlot::TestStatusMessage, worker, None);
    }

    /// `TestRunFinished`: CAS-stores the run as finished (also fatal if duplicated),
    /// formats every result, appends the accumulated status messages, and returns
    /// the finished block ready for the caller to force a render and print to
    /// stdout as a single unit (the dispatcher does both once this text is ready).
    pub fn on_test_run_finished(&self, results: &[TestResult]) -> DashboardResult<String> {
        if self
            .run_latch
            .finished
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DashboardError::ContractViolation(
                "TestRunFinished observed twice for the same run".to_string(),
            ));
        }

        for result in results {
            let line = match (&result.outcome, &result.message) {
                (TestOutcome::Pass, _) => format!("PASS {}", result.test_name),
                (TestOutcome::Skip, _) => format!("SKIP {}", result.test_name),
                (TestOutcome::Fail, Some(message)) => {
                    format!("FAIL {}: {message}", result.test_name)
                }
                (TestOutcome::Fail, None) => format!("FAIL {}", result.test_name),
            };
            append_line(&self.report, &line);
        }

        let status_messages = self
            .status_messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if !status_messages.is_empty() {
            append_line(&self.report, "--- status messages ---");
            append_line(&self.report, &status_messages);
        }

        let summary = format!(
            "TEST RUN COMPLETE: {} passed, {} failed, {} skipped",
            self.counters.test_pass(),
            self.counters.test_fail(),
            self.counters.test_skip(),
        );
        append_line(&self.report, &summary);

        Ok(self
            .report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkerId;
    use pretty_assertions::assert_eq;

    fn aggregator() -> TestAggregator {
        TestAggregator::new(Counters::new(), WorkerActivityMap::new())
    }

    #[test]
    fn duplicate_run_started_is_contract_violation() {
        let aggregator = aggregator();
        assert!(aggregator
            .on_test_run_started(&["a".to_string()])
            .is_ok());
        assert!(aggregator
            .on_test_run_started(&["a".to_string()])
            .is_err());
    }

    #[test]
    fn duplicate_run_finished_is_contract_violation() {
        let aggregator = aggregator();
        aggregator.on_test_run_started(&["a".to_string()]).unwrap();
        assert!(aggregator.on_test_run_finished(&[]).is_ok());
        assert!(aggregator.on_test_run_finished(&[]).is_err());
    }

    #[test]
    fn failure_enqueues_synthesized_log_line() {
        let aggregator = aggregator();
        let mut captured = None;
        aggregator.on_test_summary_finished(
            WorkerId(1),
            "y",
            TestOutcome::Fail,
            Some("X"),
            Some("boom"),
            |line| captured = Some(line),
        );
        assert_eq!(captured.as_deref(), Some("FAILURE X y: boom"));
    }

    #[test]
    fn pass_does_not_enqueue_log_line() {
        let aggregator = aggregator();
        let mut called = false;
        aggregator.on_test_summary_finished(WorkerId(1), "case_b", TestOutcome::Pass, None, None, |_| {
            called = true;
        });
        assert!(!called);
    }

    #[test]
    fn summary_finished_clears_activity_slot() {
        let aggregator = aggregator();
        aggregator.on_test_summary_started(WorkerId(1), "case_a", 0);
        assert_eq!(aggregator.activity.snapshot(ActivitySlot::TestSummary).len(), 1);
        aggregator.on_test_summary_finished(WorkerId(1), "case_a", TestOutcome::Pass, None, None, |_| {});
        assert!(aggregator.activity.is_empty(ActivitySlot::TestSummary));
    }

    #[test]
    fn report_includes_status_messages_and_summary() {
        let aggregator = aggregator();
        aggregator.on_test_run_started(&["a".to_string()]).unwrap();
        aggregator.on_test_status_message_started(WorkerId(1), "setting up fixtures", 0);
        aggregator.on_test_summary_finished(WorkerId(1), "a", TestOutcome::Pass, None, None, |_| {});
        let report = aggregator
            .on_test_run_finished(&[TestResult {
                test_name: "a".to_string(),
                outcome: TestOutcome::Pass,
                message: None,
            }])
            .unwrap();
        assert!(report.contains("PASS a"));
        assert!(report.contains("setting up fixtures"));
        assert!(report.contains("1 passed, 0 failed, 0 skipped"));
    }
}

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

//! Routes incoming typed events to the aggregate components that own each field.
//!
//! Every subscription here is short and safe to call from any ingestion thread.
//! The dispatcher never calls the renderer itself, except for the one case the
//! spec carves out: on `TestRunFinished` it forces a render through its
//! [`FrameDriverHandle`] and prints the accumulated report to stdout, per §4.I and
//! §4.M ("the only cross-thread call from the dispatcher into rendering is the
//! forced render() at test-run-finished"). The returned [`DispatchOutcome`] still
//! reports that this happened, for callers that want to observe it.

use crate::error::DashboardResult;
use crate::event_pairs::EventPairTracker;
use crate::frame_driver::FrameDriverHandle;
use crate::log_queue::LogEventSender;
use crate::network_stats::NetworkStatsKeeper;
use crate::test_aggregator::TestAggregator;
use crate::types::{Event, EventKind, LogLevel, WorkerId};
use crate::worker_activity::{ActivitySlot, LeafEvent, WorkerActivityMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// What happened as a side effect of dispatching one event, beyond the aggregate
/// mutation already applied. Only `TestRunFinished` produces a non-trivial outcome.
#[derive(Debug)]
pub enum DispatchOutcome {
    None,
    TestRunFinished { report: String },
}

#[derive(Clone)]
pub struct EventDispatcher {
    pub parse: EventPairTracker,
    pub action_graph: EventPairTracker,
    pub project_gen: EventPairTracker,
    pub build: EventPairTracker,
    pub install: EventPairTracker,
    pub counters: crate::counters::Counters,
    pub network_stats: NetworkStatsKeeper,
    pub dist_build: crate::dist_build::DistBuildStatusCell,
    pub build_activity: WorkerActivityMap,
    pub test_aggregator: TestAggregator,
    pub log_sender: LogEventSender,
    pub rule_count: Arc<AtomicU64>,
    pub render_handle: FrameDriverHandle,
}

impl EventDispatcher {
    pub fn on_parse_started(&self, key: crate::types::EventKey, time: u64) {
        self.parse.on_start(key, time);
    }

    pub fn on_parse_finished(&self, key: crate::types::EventKey, time: u64) {
        self.parse.on_finish(key, time);
    }

    pub fn on_action_graph_started(&self, key: crate::types::EventKey, time: u64) {
        self.action_graph.on_start(key, time);
    }

    pub fn on_action_graph_finished(&self, key: crate::types::EventKey, time: u64) {
        self.action_graph.on_finish(key, time);
    }

    pub fn on_project_gen_started(&self, key: crate::types::EventKey, time: u64) {
        self.project_gen.on_start(key, time);
    }

    pub fn on_project_gen_finished(&self, key: crate::types::EventKey, time: u64) {
        self.project_gen.on_finish(key, time);
    }

    pub fn on_build_started(&self, key: crate::types::EventKey, time: u64, rule_count: Option<u64>) {
        self.build.on_start(key, time);
        if let Some(rule_count) = rule_count {
            self.rule_count.store(rule_count, Ordering::Relaxed);
        }
    }

    pub fn on_build_finished(&self, key: crate::types::EventKey, time: u64) {
        self.build.on_finish(key, time);
    }

    pub fn on_rule_started(&self, worker: WorkerId, rule_name: &str, time: u64) {
        self.build_activity.set(
            ActivitySlot::Step,
            worker,
            Some(LeafEvent::Step {
                name: rule_name.to_string(),
                start_time: time,
            }),
        );
    }

    pub fn on_rule_finished(
        &self,
        worker: WorkerId,
        status: crate::types::RuleStatus,
        cache_result: Option<crate::types::CacheResultKind>,
    ) {
        self.build_activity.set(ActivitySlot::Step, worker, None);
        self.counters.on_rule_finished(status, cache_result);
    }

    pub fn on_step_started(&self, worker: WorkerId, step_name: &str, time: u64) {
        self.build_activity.set(
            ActivitySlot::Step,
            worker,
            Some(LeafEvent::Step {
                name: step_name.to_string(),
                start_time: time,
            }),
        );
    }

    pub fn on_step_finished(&self, worker: WorkerId) {
        self.build_activity.set(ActivitySlot::Step, worker, None);
    }

    pub fn on_cache_started(&self, worker: WorkerId, time: u64) {
        self.build_activity.set(
            ActivitySlot::Step,
            worker,
            Some(LeafEvent::CacheOp {
                description: "CHECKING CACHE".to_string(),
                start_time: time,
            }),
        );
    }

    pub fn on_cache_finished(&self, worker: WorkerId) {
        self.build_activity.set(ActivitySlot::Step, worker, None);
    }

    pub fn on_compression_started(&self, worker: WorkerId, time: u64) {
        self.build_activity.set(
            ActivitySlot::Step,
            worker,
            Some(LeafEvent::Compression { start_time: time }),
        );
    }

    pub fn on_compression_finished(&self, worker: WorkerId) {
        self.build_activity.set(ActivitySlot::Step, worker, None);
    }

    pub fn on_install_started(&self, key: crate::types::EventKey, time: u64) {
        self.install.on_start(key, time);
    }

    pub fn on_install_finished(&self, key: crate::types::EventKey, time: u64) {
        self.install.on_finish(key, time);
    }

    pub fn on_test_run_started(&self, test_names: &[String]) -> DashboardResult<()> {
        self.test_aggregator.on_test_run_started(test_names)
    }

    /// `TestRunFinished`: per §4.I/§4.M, forces one frame render and then prints
    /// the accumulated report to stdout as a single block, before returning.
    pub fn on_test_run_finished(&self, results: &[crate::types::TestResult]) -> DashboardResult<DispatchOutcome> {
        let report = self.test_aggregator.on_test_run_finished(results)?;
        self.render_handle.force_render()?;
        self.render_handle.print_stdout_block(&format!("{report}\n"))?;
        Ok(DispatchOutcome::TestRunFinished { report })
    }

    pub fn on_test_summary_started(&self, worker: WorkerId, test_name: &str, time: u64) {
        self.test_aggregator.on_test_summary_started(worker, test_name, time);
    }

    pub fn on_test_summary_finished(
        &self,
        worker: WorkerId,
        test_name: &str,
        outcome: crate::types::TestOutcome,
        test_case: Option<&str>,
        message: Option<&str>,
    ) {
        let log_sender = self.log_sender.clone();
        self.test_aggregator
            .on_test_summary_finished(worker, test_name, outcome, test_case, message, |line| {
                log_sender.error(line);
            });
    }

    pub fn on_test_status_message_started(&self, worker: WorkerId, message: &str, time: u64) {
        self.test_aggregator.on_test_status_message_started(worker, message, time);
    }

    pub fn on_test_status_message_finished(&self, worker: WorkerId) {
        self.test_aggregator.on_test_status_message_finished(worker);
    }

    pub fn on_http_artifact_scheduled(&self) {
        self.counters.on_http_upload_scheduled();
    }

    pub fn on_http_artifact_started(&self) {
        self.counters.on_http_upload_started();
    }

    pub fn on_http_artifact_finished(&self, success: bool) {
        self.counters.on_http_upload_finished(success);
    }

    pub fn on_network_bytes_received(&self, bytes: u64, time: u64) {
        self.network_stats.record(bytes, time);
    }

    pub fn on_console_log(&self, level: LogLevel, message: String, ansi_prebaked: bool) {
        let event = crate::log_queue::ConsoleEvent {
            level: match level {
                LogLevel::Info => crate::log_queue::ConsoleLevel::Info,
                LogLevel::Warn => crate::log_queue::ConsoleLevel::Warn,
                LogLevel::Error => crate::log_queue::ConsoleLevel::Error,
            },
            message,
            ansi_prebaked,
        };
        self.log_sender.send(event);
    }

    pub fn on_dist_build_status_update(&self, status: crate::types::DistBuildStatus) {
        self.dist_build.set(status);
    }

    /// Single `match`-based entry point, per §9 ("the dispatcher is a match over
    /// the tag"). Exists alongside the per-kind methods above so a caller already
    /// holding a typed [`Event`] (rather than decoding one off a live bus) can
    /// drive the engine in one call.
    pub fn dispatch(&self, event: Event) -> DashboardResult<DispatchOutcome> {
        debug!(target: "dashboard::dispatch", kind = ?std::mem::discriminant(&event.kind), "dispatching event");
        let Event {
            timestamp_ms,
            worker_id,
            event_key,
            kind,
        } = event;

        match kind {
            EventKind::ParseStarted => self.on_parse_started(event_key, timestamp_ms),
            EventKind::ParseFinished => self.on_parse_finished(event_key, timestamp_ms),
            EventKind::ActionGraphStarted => self.on_action_graph_started(event_key, timestamp_ms),
            EventKind::ActionGraphFinished => self.on_action_graph_finished(event_key, timestamp_ms),
            EventKind::ProjectGenStarted => self.on_project_gen_started(event_key, timestamp_ms),
            EventKind::ProjectGenFinished => self.on_project_gen_finished(event_key, timestamp_ms),
            EventKind::BuildStarted { rule_count } => {
                self.on_build_started(event_key, timestamp_ms, rule_count)
            }
            EventKind::BuildFinished => self.on_build_finished(event_key, timestamp_ms),
            EventKind::RuleStarted { rule_name } => {
                self.on_rule_started(worker_id, &rule_name, timestamp_ms)
            }
            EventKind::RuleFinished {
                status, cache_result, ..
            } => self.on_rule_finished(worker_id, status, cache_result),
            EventKind::StepStarted { step_name } => {
                self.on_step_started(worker_id, &step_name, timestamp_ms)
            }
            EventKind::StepFinished => self.on_step_finished(worker_id),
            EventKind::CacheStarted => self.on_cache_started(worker_id, timestamp_ms),
            EventKind::CacheFinished => self.on_cache_finished(worker_id),
            EventKind::CompressionStarted => self.on_compression_started(worker_id, timestamp_ms),
            EventKind::CompressionFinished => self.on_compression_finished(worker_id),
            EventKind::InstallStarted => self.on_install_started(event_key, timestamp_ms),
            EventKind::InstallFinished => self.on_install_finished(event_key, timestamp_ms),
            EventKind::TestRunStarted { test_names } => {
                self.on_test_run_started(&test_names)?;
                return Ok(DispatchOutcome::None);
            }
            EventKind::TestRunFinished { results } => return self.on_test_run_finished(&results),
            EventKind::TestSummaryStarted { test_name } => {
                self.on_test_summary_started(worker_id, &test_name, timestamp_ms)
            }
            EventKind::TestSummaryFinished {
                test_name,
                outcome,
                test_case,
                message,
            } => self.on_test_summary_finished(
                worker_id,
                &test_name,
                outcome,
                test_case.as_deref(),
                message.as_deref(),
            ),
            EventKind::TestStatusMessageStarted { message } => {
                self.on_test_status_message_started(worker_id, &message, timestamp_ms)
            }
            EventKind::TestStatusMessageFinished => self.on_test_status_message_finished(worker_id),
            EventKind::HttpArtifactScheduled => self.on_http_artifact_scheduled(),
            EventKind::HttpArtifactStarted => self.on_http_artifact_started(),
            EventKind::HttpArtifactFinished { success } => self.on_http_artifact_finished(success),
            EventKind::NetworkBytesReceived { bytes } => {
                self.on_network_bytes_received(bytes, timestamp_ms)
            }
            EventKind::ConsoleLog {
                level,
                message,
                ansi_prebaked,
            } => self.on_console_log(level, message, ansi_prebaked),
            EventKind::DistBuildStatusUpdate { status } => self.on_dist_build_status_update(status),
            EventKind::CommandStarted | EventKind::CommandFinished => {}
        }

        Ok(DispatchOutcome::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CacheResultKind, EventKey, RuleStatus};
    use pretty_assertions::assert_eq;

    fn test_render_handle() -> FrameDriverHandle {
        let composer = crate::frame_composer::FrameComposer {
            parse: EventPairTracker::new(),
            action_graph: EventPairTracker::new(),
            project_gen: EventPairTracker::new(),
            build: EventPairTracker::new(),
            install: EventPairTracker::new(),
            counters: crate::counters::Counters::new(),
            network_stats: NetworkStatsKeeper::new(),
            dist_build: crate::dist_build::DistBuildStatusCell::new(),
            build_activity: WorkerActivityMap::new(),
            test_aggregator: TestAggregator::new(crate::counters::Counters::new(), WorkerActivityMap::new()),
            progress: Arc::new(crate::progress::NullProgressEstimator),
            log_latches: crate::log_queue::PrintedLatches::default(),
            config: crate::config::Config::default(),
            locale: crate::clock::Locale::EN_US,
            rule_count: Arc::new(AtomicU64::new(0)),
            build_id: None,
        };
        let (_, receiver) = crate::log_queue::channel();
        let (_driver, handle) = crate::frame_driver::FrameDriver::new(
            composer,
            crate::terminal_writer::TerminalWriter::new(),
            receiver,
            Arc::new(crate::clock::ManualClock::new(0)),
            std::time::Duration::from_millis(150),
        );
        handle
    }

    fn dispatcher() -> EventDispatcher {
        let (log_sender, _receiver) = crate::log_queue::channel();
        let build_activity = WorkerActivityMap::new();
        let counters = crate::counters::Counters::new();
        EventDispatcher {
            parse: EventPairTracker::new(),
            action_graph: EventPairTracker::new(),
            project_gen: EventPairTracker::new(),
            build: EventPairTracker::new(),
            install: EventPairTracker::new(),
            counters: counters.clone(),
            network_stats: NetworkStatsKeeper::new(),
            dist_build: crate::dist_build::DistBuildStatusCell::new(),
            build_activity: build_activity.clone(),
            test_aggregator: TestAggregator::new(counters, build_activity),
            log_sender,
            rule_count: Arc::new(AtomicU64::new(0)),
            render_handle: test_render_handle(),
        }
    }

    #[test]
    fn rule_finished_folds_into_counters_and_clears_activity() {
        let dispatcher = dispatcher();
        dispatcher.on_rule_started(WorkerId(1), "//a:a", 0);
        dispatcher.on_rule_finished(WorkerId(1), RuleStatus::Success, Some(CacheResultKind::Miss));
        assert_eq!(dispatcher.counters.cache_miss(), 1);
        assert!(dispatcher.build_activity.is_empty(ActivitySlot::Step));
    }

    #[test]
    fn dispatch_routes_build_started_with_rule_count() {
        let dispatcher = dispatcher();
        dispatcher
            .dispatch(Event::new(
                0,
                WorkerId(0),
                EventKey::new("build"),
                EventKind::BuildStarted { rule_count: Some(42) },
            ))
            .unwrap();
        assert_eq!(dispatcher.rule_count.load(Ordering::Relaxed), 42);
        assert!(!dispatcher.build.pairs().is_empty());
    }

    #[test]
    fn dispatch_test_run_finished_returns_report_outcome() {
        let dispatcher = dispatcher();
        dispatcher.on_test_run_started(&["a".to_string()]).unwrap();
        let outcome = dispatcher
            .dispatch(Event::new(
                0,
                WorkerId(0),
                EventKey::new("run"),
                EventKind::TestRunFinished { results: vec![] },
            ))
            .unwrap();
        match outcome {
            DispatchOutcome::TestRunFinished { report } => {
                assert!(report.contains("TEST RUN COMPLETE"));
            }
            DispatchOutcome::None => panic!("expected a TestRunFinished outcome"),
        }
    }

    #[test]
    fn test_failure_enqueues_error_log_line() {
        let (log_sender, mut log_receiver) = crate::log_queue::channel();
        let build_activity = WorkerActivityMap::new();
        let counters = crate::counters::Counters::new();
        let dispatcher = EventDispatcher {
            parse: EventPairTracker::new(),
            action_graph: EventPairTracker::new(),
            project_gen: EventPairTracker::new(),
            build: EventPairTracker::new(),
            install: EventPairTracker::new(),
            counters: counters.clone(),
            network_stats: NetworkStatsKeeper::new(),
            dist_build: crate::dist_build::DistBuildStatusCell::new(),
            build_activity: build_activity.clone(),
            test_aggregator: TestAggregator::new(counters, build_activity),
            log_sender,
            rule_count: Arc::new(AtomicU64::new(0)),
            render_handle: test_render_handle(),
        };

        dispatcher.on_test_summary_finished(
            WorkerId(1),
            "y",
            crate::types::TestOutcome::Fail,
            Some("X"),
            Some("boom"),
        );

        let lines = log_receiver.drain_to_lines();
        assert_eq!(lines, vec!["FAILURE X y: boom"]);
    }

    #[test]
    fn unknown_command_events_are_ignored() {
        let dispatcher = dispatcher();
        let outcome = dispatcher
            .dispatch(Event::new(0, WorkerId(0), EventKey::new("cmd"), EventKind::CommandStarted))
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::None));
    }
}

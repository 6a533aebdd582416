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

//! Produces the ordered list of lines for one frame tick.
//!
//! This is the one component that reads every other aggregate in the crate; it
//! writes none of them. Each block below is elided outright when its gating
//! condition doesn't hold, so the composer is read top-to-bottom as the literal
//! frame layout.

use crate::clock::{format_elapsed_ms, Locale};
use crate::config::Config;
use crate::counters::Counters;
use crate::dist_build::DistBuildStatusCell;
use crate::event_pairs::{any_started, between, elapsed_combined, union_ms, EventPairTracker};
use crate::log_queue::PrintedLatches;
use crate::network_stats::NetworkStatsKeeper;
use crate::progress::ProgressEstimator;
use crate::terminal_writer::as_warning;
use crate::test_aggregator::TestAggregator;
use crate::thread_renderer::{render_thread_lines, ThreadRenderPolicy, WorkerElapsedMs};
use crate::types::DistBuildState;
use crate::worker_activity::{ActivitySlot, WorkerActivityMap};
use chrono::TimeZone;
use std::sync::Arc;

/// Everything the frame composer reads, gathered behind one cheaply cloneable
/// handle. Each field is itself an `Arc`-backed aggregate, so cloning this struct
/// is O(1) and shares state with the dispatcher that mutates it.
#[derive(Clone)]
pub struct FrameComposer {
    pub parse: EventPairTracker,
    pub action_graph: EventPairTracker,
    pub project_gen: EventPairTracker,
    pub build: EventPairTracker,
    pub install: EventPairTracker,
    pub counters: Counters,
    pub network_stats: NetworkStatsKeeper,
    pub dist_build: DistBuildStatusCell,
    pub build_activity: WorkerActivityMap,
    pub test_aggregator: TestAggregator,
    pub progress: Arc<dyn ProgressEstimator>,
    pub log_latches: PrintedLatches,
    pub config: Config,
    pub locale: Locale,
    pub rule_count: Arc<std::sync::atomic::AtomicU64>,
    pub build_id: Option<String>,
}

fn pct_suffix(progress: Option<f64>) -> String {
    match progress {
        Some(fraction) => format!(" [{:.0}%]", (fraction.clamp(0.0, 1.0) * 100.0).round()),
        None => String::new(),
    }
}

impl FrameComposer {
    /// Builds the ordered line list for the current instant `now`, per §4.K.
    pub fn compose(&self, now: u64) -> Vec<String> {
        let mut lines = Vec::new();

        let build_started = any_started(&[self.build.pairs()]);
        let is_distributed = self.dist_build.is_distributed();

        if build_started && is_distributed {
            self.push_dist_build_debug_block(&mut lines);
        }

        let processing = elapsed_combined(&[self.parse.pairs(), self.action_graph.pairs()], now);
        let processing_started = any_started(&[self.parse.pairs(), self.action_graph.pairs()]);
        let processing_complete = processing_started && processing.currently_running_ms.is_none();

        if !processing_complete {
            self.push_parse_line(&mut lines, now);
            self.push_processing_line(&mut lines, &processing);
        }

        self.push_project_gen_line(&mut lines, now);

        if processing_complete {
            self.push_network_stats_line(&mut lines, now, build_started);
            if is_distributed {
                self.push_dist_build_status_line(&mut lines);
            }
            self.push_building_line(&mut lines, now);
            if self.build_in_progress(now) {
                self.push_build_thread_block(&mut lines, now);
            }
            self.push_testing_line(&mut lines, now);
            self.push_installing_line(&mut lines, now);
            self.push_http_upload_line(&mut lines);
        }

        lines
    }

    fn push_dist_build_debug_block(&self, lines: &mut Vec<String>) {
        let Some(status) = self.dist_build.get() else {
            return;
        };
        lines.push(as_warning("Distributed build debug info:"));
        for entry in &status.log_book {
            let timestamp = chrono::Utc
                .timestamp_millis_opt(entry.timestamp_ms as i64)
                .single()
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
                .unwrap_or_else(|| "????-??-?? ??:??:??.???".to_string());
            lines.push(format!("[{timestamp}] {}", entry.name));
        }
    }

    fn push_parse_line(&self, lines: &mut Vec<String>, now: u64) {
        if !any_started(&[self.parse.pairs()]) {
            return;
        }
        let parse_elapsed = crate::event_pairs::elapsed(self.parse.pairs(), now);
        let ongoing = parse_elapsed.currently_running_ms.is_some();
        let marker = if ongoing { "[+]" } else { "[ -]" };
        let total_ms = parse_elapsed.completed_ms + parse_elapsed.currently_running_ms.unwrap_or(0);
        lines.push(format!(
            "{marker} PARSING BUCK FILES...{}{}",
            format_elapsed_ms(total_ms, self.locale),
            pct_suffix(self.progress.parse_progress())
        ));
    }

    fn push_processing_line(&self, lines: &mut Vec<String>, processing: &crate::event_pairs::Elapsed) {
        if processing.completed_ms == 0 && processing.currently_running_ms.is_none() {
            return;
        }
        let marker = "[\u{b1}]";
        let total_ms = processing.completed_ms + processing.currently_running_ms.unwrap_or(0);
        lines.push(format!(
            "{marker} PROCESSING BUCK FILES...{}{}",
            format_elapsed_ms(total_ms, self.locale),
            pct_suffix(self.progress.parse_progress())
        ));
    }

    fn push_project_gen_line(&self, lines: &mut Vec<String>, now: u64) {
        if !any_started(&[self.project_gen.pairs()]) {
            return;
        }
        let elapsed = crate::event_pairs::elapsed(self.project_gen.pairs(), now);
        let ongoing = elapsed.currently_running_ms.is_some();
        let marker = if ongoing { "[+]" } else { "[ -]" };
        let total_ms = elapsed.completed_ms + elapsed.currently_running_ms.unwrap_or(0);
        lines.push(format!(
            "{marker} GENERATING PROJECT...{}{}",
            format_elapsed_ms(total_ms, self.locale),
            pct_suffix(self.progress.project_gen_progress())
        ));
    }

    fn push_network_stats_line(&self, lines: &mut Vec<String>, now: u64, build_started: bool) {
        let build_finished = self.build_finished(now);
        let marker = if build_started && !build_finished {
            "[+]"
        } else {
            "[-]"
        };
        let speed = self.network_stats.instantaneous_rate(now);
        let total = self.network_stats.total_rate();
        lines.push(format!(
            "{marker} DOWNLOADING... ({:.1} {}/s, TOTAL: {:.1} {}, {} Artifacts)",
            speed.value,
            speed.unit,
            total.value,
            total.unit,
            self.counters.http_uploads_done()
        ));
    }

    fn push_dist_build_status_line(&self, lines: &mut Vec<String>) {
        let Some(status) = self.dist_build.get() else {
            return;
        };
        let state = match status.state {
            DistBuildState::Init => "INIT",
            DistBuildState::Queued => "QUEUED",
            DistBuildState::Running => "RUNNING",
            DistBuildState::FinishedSuccessfully => "FINISHED SUCCESSFULLY",
            DistBuildState::Failed => "FAILED",
        };
        let mut line = format!("DISTRIBUTED BUILD: {state}");
        if let Some(message) = &status.message {
            line.push_str(&format!(" - {message}"));
        }
        lines.push(line);
    }

    fn build_finished(&self, now: u64) -> bool {
        any_started(&[self.build.pairs()])
            && crate::event_pairs::elapsed(self.build.pairs(), now)
                .currently_running_ms
                .is_none()
    }

    fn build_in_progress(&self, now: u64) -> bool {
        any_started(&[self.build.pairs()]) && !self.build_finished(now)
    }

    fn push_building_line(&self, lines: &mut Vec<String>, now: u64) {
        if !any_started(&[self.build.pairs()]) {
            return;
        }
        let build_elapsed = crate::event_pairs::elapsed(self.build.pairs(), now);
        let Some((build_start, build_end)) = self.build_window(now) else {
            return;
        };

        let parse_proxies = between(build_start, build_end, self.parse.pairs());
        let action_graph_proxies = between(build_start, build_end, self.action_graph.pairs());
        let mut overlapping = parse_proxies;
        overlapping.extend(action_graph_proxies);
        let offset_ms = union_ms(&overlapping);

        let total_ms = build_elapsed.completed_ms + build_elapsed.currently_running_ms.unwrap_or(0);
        let displayed_ms = total_ms.saturating_sub(offset_ms);
        let marker = if build_elapsed.currently_running_ms.is_some() {
            "[\u{b1}]"
        } else {
            "[-]"
        };

        let rule_count = self.rule_count.load(std::sync::atomic::Ordering::Relaxed);
        let jobs_summary = if rule_count > 0 {
            format!(" ({})", self.counters.jobs_summary(rule_count))
        } else {
            String::new()
        };

        let trace_suffix = match (self.config.http_server_port, &self.build_id) {
            (Some(port), Some(build_id)) => {
                format!(", Details: http://localhost:{port}/trace/{build_id}")
            }
            _ => String::new(),
        };

        lines.push(format!(
            "{marker} BUILDING...{}{}{jobs_summary}{trace_suffix}",
            format_elapsed_ms(displayed_ms, self.locale),
            pct_suffix(self.progress.build_progress())
        ));
    }

    /// `(build_start, build_end_or_now)` if the build has started. `build_end`
    /// comes from the pair's `end_time` once finished, else `now`.
    fn build_window(&self, now: u64) -> Option<(u64, u64)> {
        let pair = *self.build.pairs().iter().next()?.value();
        Some((pair.start_time, pair.end_time.unwrap_or(now)))
    }

    fn push_build_thread_block(&self, lines: &mut Vec<String>, now: u64) {
        let elapsed_by_worker = self.worker_elapsed_snapshot(now);
        let policy = ThreadRenderPolicy {
            max_lines: self
                .config
                .effective_thread_line_limit(self.log_latches.any_warnings_printed(), self.log_latches.any_errors_printed()),
            always_sort_by_time: self.config.always_sort_threads_by_time,
        };
        lines.extend(render_thread_lines(
            &self.build_activity,
            ActivitySlot::Step,
            &elapsed_by_worker,
            policy,
            self.locale,
        ));
    }

    /// The renderer only tracks a start time per leaf event, not an accumulated
    /// total per worker across several steps; elapsed for the thread block is
    /// simply "now minus this leaf event's own start".
    fn worker_elapsed_snapshot(&self, now: u64) -> WorkerElapsedMs {
        self.build_activity
            .snapshot(ActivitySlot::Step)
            .into_iter()
            .map(|(worker_id, leaf_event)| (worker_id, now.saturating_sub(leaf_event.start_time())))
            .collect()
    }

    fn push_testing_line(&self, lines: &mut Vec<String>, now: u64) {
        if !self.test_aggregator.is_started() {
            return;
        }
        let marker = if self.test_aggregator.is_finished() {
            "[-]"
        } else {
            "[\u{b1}]"
        };
        lines.push(format!(
            "{marker} TESTING...({} PASS/{} SKIP/{} FAIL)",
            self.counters.test_pass(),
            self.counters.test_skip(),
            self.counters.test_fail()
        ));

        if !self.test_aggregator.is_finished() {
            let elapsed_by_worker = self.worker_elapsed_snapshot_for(ActivitySlot::TestSummary, now);
            let policy = ThreadRenderPolicy {
                max_lines: self.config.effective_thread_line_limit(
                    self.log_latches.any_warnings_printed(),
                    self.log_latches.any_errors_printed(),
                ),
                always_sort_by_time: self.config.always_sort_threads_by_time,
            };
            lines.extend(render_thread_lines(
                &self.build_activity,
                ActivitySlot::TestSummary,
                &elapsed_by_worker,
                policy,
                self.locale,
            ));
            let status_elapsed = self.worker_elapsed_snapshot_for(ActivitySlot::TestStatusMessage, now);
            lines.extend(render_thread_lines(
                &self.build_activity,
                ActivitySlot::TestStatusMessage,
                &status_elapsed,
                policy,
                self.locale,
            ));
        }
    }

    fn worker_elapsed_snapshot_for(&self, slot: ActivitySlot, now: u64) -> WorkerElapsedMs {
        self.build_activity
            .snapshot(slot)
            .into_iter()
            .map(|(worker_id, leaf_event)| (worker_id, now.saturating_sub(leaf_event.start_time())))
            .collect()
    }

    fn push_installing_line(&self, lines: &mut Vec<String>, now: u64) {
        if !any_started(&[self.install.pairs()]) {
            return;
        }
        let elapsed = crate::event_pairs::elapsed(self.install.pairs(), now);
        let marker = if elapsed.currently_running_ms.is_some() {
            "[\u{b1}]"
        } else {
            "[-]"
        };
        let total_ms = elapsed.completed_ms + elapsed.currently_running_ms.unwrap_or(0);
        lines.push(format!(
            "{marker} INSTALLING...{}",
            format_elapsed_ms(total_ms, self.locale)
        ));
    }

    fn push_http_upload_line(&self, lines: &mut Vec<String>) {
        let scheduled = self.counters.http_uploads_scheduled();
        if scheduled == 0 {
            return;
        }
        let started = self.counters.http_uploads_started();
        let done = self.counters.http_uploads_done();
        let failed = self.counters.http_uploads_failed();
        let uploading = started.saturating_sub(done + failed);
        let pending = scheduled.saturating_sub(started);
        lines.push(format!(
            "HTTP CACHE UPLOAD: {done} COMPLETE/{failed} FAILED/{uploading} UPLOADING/{pending} PENDING"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgressEstimator;
    use crate::types::WorkerId;
    use pretty_assertions::assert_eq;

    fn composer() -> FrameComposer {
        FrameComposer {
            parse: EventPairTracker::new(),
            action_graph: EventPairTracker::new(),
            project_gen: EventPairTracker::new(),
            build: EventPairTracker::new(),
            install: EventPairTracker::new(),
            counters: Counters::new(),
            network_stats: NetworkStatsKeeper::new(),
            dist_build: DistBuildStatusCell::new(),
            build_activity: WorkerActivityMap::new(),
            test_aggregator: TestAggregator::new(Counters::new(), WorkerActivityMap::new()),
            progress: Arc::new(NullProgressEstimator),
            log_latches: PrintedLatches::default(),
            config: Config::default(),
            locale: Locale::EN_US,
            rule_count: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            build_id: None,
        }
    }

    #[test]
    fn empty_build_emits_no_lines() {
        let composer = composer();
        assert!(composer.compose(0).is_empty());
    }

    #[test]
    fn parse_then_build_scenario_renders_expected_building_line() {
        let composer = composer();
        composer.parse.on_start(crate::types::EventKey::new("parse"), 0);
        composer.parse.on_finish(crate::types::EventKey::new("parse"), 1000);
        composer.rule_count.store(10, std::sync::atomic::Ordering::Relaxed);
        composer.build.on_start(crate::types::EventKey::new("build"), 1000);
        for i in 0..10 {
            composer.counters.on_rule_finished(
                crate::types::RuleStatus::Success,
                Some(crate::types::CacheResultKind::LocalKeyUnchangedHit),
            );
            let _ = i;
        }
        composer.build.on_finish(crate::types::EventKey::new("build"), 2000);

        let lines = composer.compose(2500);
        let building_line = lines.iter().find(|line| line.contains("BUILDING")).unwrap();
        assert!(building_line.contains("1.0s"));
        assert!(building_line.contains("10/10 JOBS, 0 UPDATED, 0 [0.0%] CACHE MISS"));
    }

    #[test]
    fn distributed_build_debug_block_appears_only_when_distributed() {
        let composer = composer();
        composer.build.on_start(crate::types::EventKey::new("build"), 0);
        assert!(!composer.compose(0).iter().any(|line| line.contains("Distributed build debug")));

        composer.dist_build.set(crate::types::DistBuildStatus {
            state: DistBuildState::Running,
            eta_ms: None,
            message: None,
            log_book: vec![crate::types::LogBookEntry {
                timestamp_ms: 0,
                name: "scheduling".to_string(),
            }],
        });
        let lines = composer.compose(0);
        assert!(lines.iter().any(|line| line.contains("Distributed build debug info")));
    }

    #[test]
    fn thread_compression_scenario_matches_expected_format() {
        let composer = composer();
        composer.build.on_start(crate::types::EventKey::new("build"), 0);
        for worker_id in 1..=6u32 {
            composer.build_activity.set(
                ActivitySlot::Step,
                WorkerId(worker_id),
                Some(crate::worker_activity::LeafEvent::Step {
                    name: format!("//r{worker_id}"),
                    start_time: 0,
                }),
            );
        }
        let mut config = Config::default();
        config.default_thread_line_limit = 3;
        let mut composer = composer;
        composer.config = config;

        let lines = composer.compose(1000);
        let compressed = lines.iter().find(|line| line.contains("MORE THREADS")).unwrap();
        assert!(compressed.starts_with(" |=> 4 MORE THREADS:"));
    }

    #[test]
    fn http_upload_line_hidden_until_first_upload_scheduled() {
        let composer = composer();
        composer.build.on_start(crate::types::EventKey::new("build"), 0);
        composer.build.on_finish(crate::types::EventKey::new("build"), 100);
        composer.parse.on_start(crate::types::EventKey::new("p"), 0);
        composer.parse.on_finish(crate::types::EventKey::new("p"), 50);
        assert!(!composer.compose(200).iter().any(|line| line.contains("HTTP CACHE UPLOAD")));
        composer.counters.on_http_upload_scheduled();
        let lines = composer.compose(200);
        assert!(lines.iter().any(|line| line.contains("HTTP CACHE UPLOAD")));
    }

    #[test]
    fn jobs_summary_elided_when_rule_count_unknown() {
        let composer = composer();
        composer.build.on_start(crate::types::EventKey::new("build"), 0);
        let lines = composer.compose(500);
        let building_line = lines.iter().find(|line| line.contains("BUILDING")).unwrap();
        assert!(!building_line.contains("JOBS"));
    }

    #[test]
    fn cache_percentage_scenario_matches_spec_example() {
        let counters = Counters::new();
        counters.on_rule_finished(crate::types::RuleStatus::Success, Some(crate::types::CacheResultKind::Miss));
        counters.on_rule_finished(crate::types::RuleStatus::Success, Some(crate::types::CacheResultKind::Error));
        counters.on_rule_finished(crate::types::RuleStatus::Success, Some(crate::types::CacheResultKind::Hit));
        counters.on_rule_finished(
            crate::types::RuleStatus::Success,
            Some(crate::types::CacheResultKind::LocalKeyUnchangedHit),
        );
        assert_eq!(
            counters.jobs_summary(4),
            "4/4 JOBS, 3 UPDATED, 1 [25.0%] CACHE MISS, 1 [33.3%] CACHE ERRORS"
        );
    }
}

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

//! The single entry point a caller actually holds: construct, start the render
//! scheduler, feed it events, close.
//!
//! Shaped after `TerminalAsync`: a small struct wrapping the pieces wired together
//! at construction, a cheap cloneable handle for other tasks to hold
//! ([`DashboardIngestHandle`]), and an idempotent `close()`.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::counters::Counters;
use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::dist_build::DistBuildStatusCell;
use crate::error::DashboardResult;
use crate::event_pairs::EventPairTracker;
use crate::frame_composer::FrameComposer;
use crate::frame_driver::{FrameDriver, FrameDriverHandle};
use crate::log_queue::{self, LogEventSender};
use crate::network_stats::NetworkStatsKeeper;
use crate::progress::{NullProgressEstimator, ProgressEstimator};
use crate::terminal_writer::TerminalWriter;
use crate::test_aggregator::TestAggregator;
use crate::types::Event;
use crate::worker_activity::WorkerActivityMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Cheap, cloneable handle for ingestion-side callers: send an [`Event`], or reach
/// the log queue directly without going through the typed event model.
#[derive(Clone)]
pub struct DashboardIngestHandle {
    dispatcher: EventDispatcher,
}

impl DashboardIngestHandle {
    pub fn dispatch(&self, event: Event) -> DashboardResult<DispatchOutcome> {
        self.dispatcher.dispatch(event)
    }

    pub fn log_sender(&self) -> LogEventSender {
        self.dispatcher.log_sender.clone()
    }
}

/// Constructed once per build/test run. `start()` spawns the render scheduler;
/// `close()` is idempotent and guarantees exactly one final render, per §9.
pub struct DashboardEngine {
    ingest: DashboardIngestHandle,
    driver_handle: FrameDriverHandle,
    render_task: Option<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
}

pub struct DashboardEngineBuilder {
    config: Config,
    progress: Arc<dyn ProgressEstimator>,
    clock: Arc<dyn Clock>,
    build_id: Option<String>,
}

impl Default for DashboardEngineBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            progress: Arc::new(NullProgressEstimator),
            clock: Arc::new(SystemClock::new()),
            build_id: None,
        }
    }
}

impl DashboardEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn progress_estimator(mut self, progress: Arc<dyn ProgressEstimator>) -> Self {
        self.progress = progress;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = Some(build_id.into());
        self
    }

    /// Wires every component together and spawns the render scheduler. There is
    /// no separate `try_new`/`start` split (unlike `TerminalAsync`, which can
    /// return `None` for a non-interactive terminal) -- this engine always
    /// renders; callers that want to suppress output entirely should not
    /// construct one.
    pub fn start(self) -> DashboardEngine {
        let counters = Counters::new();
        let build_activity = WorkerActivityMap::new();
        let (log_sender, log_receiver) = log_queue::channel();
        let rule_count = Arc::new(AtomicU64::new(0));

        let parse = EventPairTracker::new();
        let action_graph = EventPairTracker::new();
        let project_gen = EventPairTracker::new();
        let build = EventPairTracker::new();
        let install = EventPairTracker::new();
        let network_stats = NetworkStatsKeeper::new();
        let dist_build = DistBuildStatusCell::new();
        let test_aggregator = TestAggregator::new(counters.clone(), build_activity.clone());

        // Built before the dispatcher so its render handle can be attached below --
        // the composer and the dispatcher both read/write the same shared
        // aggregates, they don't depend on one another.
        let composer = FrameComposer {
            parse: parse.clone(),
            action_graph: action_graph.clone(),
            project_gen: project_gen.clone(),
            build: build.clone(),
            install: install.clone(),
            counters: counters.clone(),
            network_stats: network_stats.clone(),
            dist_build: dist_build.clone(),
            build_activity: build_activity.clone(),
            test_aggregator: test_aggregator.clone(),
            progress: self.progress,
            log_latches: log_receiver.latches().clone(),
            config: self.config.clone(),
            locale: crate::clock::Locale::EN_US,
            rule_count: rule_count.clone(),
            build_id: self.build_id,
        };

        let terminal = TerminalWriter::new();
        let (driver, driver_handle) = FrameDriver::new(
            composer,
            terminal,
            log_receiver,
            self.clock,
            Duration::from_millis(self.config.render_interval_ms),
        );

        let dispatcher = EventDispatcher {
            parse,
            action_graph,
            project_gen,
            build,
            install,
            counters,
            network_stats,
            dist_build,
            build_activity,
            test_aggregator,
            log_sender,
            rule_count,
            render_handle: driver_handle.clone(),
        };

        let render_task = tokio::spawn(driver.run());

        DashboardEngine {
            ingest: DashboardIngestHandle { dispatcher },
            driver_handle,
            render_task: Some(render_task),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl DashboardEngine {
    pub fn ingest_handle(&self) -> DashboardIngestHandle {
        self.ingest.clone()
    }

    pub fn dispatch(&self, event: Event) -> DashboardResult<DispatchOutcome> {
        self.ingest.dispatch(event)
    }

    pub fn is_stream_dirty(&self) -> bool {
        self.driver_handle.is_stream_dirty()
    }

    /// Idempotent: the second and subsequent calls are no-ops. Always performs
    /// exactly one final render, even if the render task already exited on its
    /// own (e.g. after detecting a dirty stream).
    pub async fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.driver_handle.request_shutdown();
        if let Some(render_task) = self.render_task.take() {
            let _ = render_task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn engine_starts_and_closes_idempotently() {
        let mut engine = DashboardEngineBuilder::new().start();
        engine.close().await;
        engine.close().await;
    }

    #[tokio::test]
    async fn test_run_finished_forces_a_render_and_reports_completion() {
        let mut engine = DashboardEngineBuilder::new().start();
        let handle = engine.ingest_handle();
        handle
            .dispatch(Event::new(
                0,
                crate::types::WorkerId(0),
                crate::types::EventKey::new("run"),
                crate::types::EventKind::TestRunStarted {
                    test_names: vec!["a".to_string()],
                },
            ))
            .unwrap();
        let outcome = handle
            .dispatch(Event::new(
                0,
                crate::types::WorkerId(0),
                crate::types::EventKey::new("run"),
                crate::types::EventKind::TestRunFinished { results: vec![] },
            ))
            .unwrap();
        match outcome {
            DispatchOutcome::TestRunFinished { report } => {
                assert!(report.contains("TEST RUN COMPLETE"));
            }
            DispatchOutcome::None => panic!("expected a TestRunFinished outcome"),
        }
        engine.close().await;
    }

    #[tokio::test]
    async fn dispatch_reaches_aggregate_state_through_the_ingest_handle() {
        let mut engine = DashboardEngineBuilder::new().start();
        let handle = engine.ingest_handle();
        handle
            .dispatch(Event::new(
                0,
                crate::types::WorkerId(0),
                crate::types::EventKey::new("build"),
                crate::types::EventKind::BuildStarted { rule_count: Some(5) },
            ))
            .unwrap();
        engine.close().await;
    }
}

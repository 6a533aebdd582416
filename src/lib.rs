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

//! A live terminal dashboard engine for a parallel build/test orchestrator.
//!
//! Worker threads report typed [`types::Event`]s (parse, action-graph, rules, cache,
//! tests, network, distributed-build status) through [`engine::DashboardEngine`]. A
//! single background task folds them into a handful of lock-free aggregates and
//! redraws a self-clearing ANSI status frame on a fixed tick, interleaving any
//! warning/error log lines above it.
//!
//! ```no_run
//! use buildwatch_console::{DashboardEngineBuilder, Event, EventKey, EventKind, WorkerId};
//!
//! # async fn run() {
//! let mut engine = DashboardEngineBuilder::new().start();
//! engine
//!     .dispatch(Event::new(0, WorkerId(0), EventKey::new("build"), EventKind::BuildStarted {
//!         rule_count: Some(120),
//!     }))
//!     .unwrap();
//! engine.close().await;
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod counters;
pub mod dispatcher;
pub mod dist_build;
pub mod engine;
pub mod error;
pub mod event_pairs;
pub mod frame_composer;
pub mod frame_driver;
pub mod log_queue;
pub mod logging;
pub mod network_stats;
pub mod progress;
pub mod terminal_writer;
pub mod test_aggregator;
pub mod thread_renderer;
pub mod types;
pub mod worker_activity;

pub use clock::{Clock, Locale, ManualClock, SystemClock};
pub use config::{Config, TestResultVerbosity};
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use engine::{DashboardEngine, DashboardEngineBuilder, DashboardIngestHandle};
pub use error::{DashboardError, DashboardResult};
pub use logging::{DisplayTarget, LoggingConfig, LoggingGuard};
pub use types::{
    CacheResultKind, DistBuildState, DistBuildStatus, Event, EventKey, EventKind, LogBookEntry,
    LogLevel, RuleStatus, TestOutcome, TestResult, WorkerId,
};

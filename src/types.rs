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

//! The event sum type ingested by the [`crate::dispatcher::EventDispatcher`].
//!
//! Per the design notes, this replaces a polymorphic event class hierarchy with a
//! tagged union: [`EventKind`] carries kind-specific payloads, and the dispatcher is a
//! single `match` over the tag.

use std::sync::Arc;

/// Stable integer identity of a build/test executor thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

/// Correlation id used to pair a start event with its finish event. Cheaply
/// cloneable since it's threaded through every map key on every ingestion thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey(pub Arc<str>);

impl EventKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }
}

impl From<&str> for EventKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EventKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// An immutable, timestamped event arriving from the event bus.
#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp_ms: u64,
    pub worker_id: WorkerId,
    pub event_key: EventKey,
    pub kind: EventKind,
}

impl Event {
    pub fn new(timestamp_ms: u64, worker_id: WorkerId, event_key: EventKey, kind: EventKind) -> Self {
        Self {
            timestamp_ms,
            worker_id,
            event_key,
            kind,
        }
    }
}

/// Outcome of a rule's cache lookup, folded into [`crate::counters::Counters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CacheResultKind {
    Hit,
    Miss,
    Error,
    Ignored,
    LocalKeyUnchangedHit,
}

/// Terminal status of a rule-finish event. Only `Success` participates in the cache
/// fold (see §4.E); other statuses still complete the rule counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    Success,
    Failure,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Pass,
    Fail,
    Skip,
}

#[derive(Debug, Clone)]
pub struct TestResult {
    pub test_name: String,
    pub outcome: TestOutcome,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Latest-wins snapshot of a distributed build's remote state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistBuildState {
    Init,
    Queued,
    Running,
    FinishedSuccessfully,
    Failed,
}

#[derive(Debug, Clone)]
pub struct LogBookEntry {
    pub timestamp_ms: u64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct DistBuildStatus {
    pub state: DistBuildState,
    pub eta_ms: Option<u64>,
    pub message: Option<String>,
    pub log_book: Vec<LogBookEntry>,
}

/// Tagged union of every event kind the dispatcher can route. Unknown/future kinds
/// arriving on the bus are simply never constructed here — per §6, they're ignored
/// at the boundary that decodes bus messages into this type, not inside the engine.
#[derive(Debug, Clone)]
pub enum EventKind {
    ParseStarted,
    ParseFinished,
    ActionGraphStarted,
    ActionGraphFinished,
    ProjectGenStarted,
    ProjectGenFinished,
    BuildStarted { rule_count: Option<u64> },
    BuildFinished,
    RuleStarted { rule_name: String },
    RuleFinished {
        rule_name: String,
        status: RuleStatus,
        cache_result: Option<CacheResultKind>,
    },
    StepStarted { step_name: String },
    StepFinished,
    CacheStarted,
    CacheFinished,
    CompressionStarted,
    CompressionFinished,
    InstallStarted,
    InstallFinished,
    TestRunStarted { test_names: Vec<String> },
    TestRunFinished { results: Vec<TestResult> },
    TestSummaryStarted { test_name: String },
    TestSummaryFinished {
        test_name: String,
        outcome: TestOutcome,
        test_case: Option<String>,
        message: Option<String>,
    },
    TestStatusMessageStarted { message: String },
    TestStatusMessageFinished,
    HttpArtifactScheduled,
    HttpArtifactStarted,
    HttpArtifactFinished { success: bool },
    NetworkBytesReceived { bytes: u64 },
    ConsoleLog {
        level: LogLevel,
        message: String,
        ansi_prebaked: bool,
    },
    DistBuildStatusUpdate { status: DistBuildStatus },
    CommandStarted,
    CommandFinished,
}

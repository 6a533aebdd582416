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

use std::io;
use thiserror::Error;

/// Errors surfaced by the dashboard engine.
///
/// Per the error handling design: contract violations are programming bugs in the
/// event producer and must not be masked; render errors are logged (by the caller,
/// via `tracing::error!`) before being rethrown; dirty-stream detection is *not* an
/// error, it's a silent permanent mode transition (see [`crate::frame_driver`]).
#[derive(Debug, Error)]
pub enum DashboardError {
    /// A producer violated an event-ordering contract, e.g. sent `TestRunStarted`
    /// twice without an intervening `TestRunFinished`.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// An I/O error occurred while writing a frame or test report.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A tick of the frame driver failed to render.
    #[error("render failed: {0}")]
    Render(String),
}

pub type DashboardResult<T> = miette::Result<T, DashboardError>;

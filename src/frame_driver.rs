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

//! The periodic tick that clears the previous frame and writes the next one.
//!
//! Modeled as a dedicated worker that sleeps for `render_interval_ms` and checks a
//! cancellation flag on each wake, per the design notes' "scheduled executor"
//! guidance -- not a generic task-scheduling abstraction, since this crate only
//! ever needs the one recurring tick.

use crate::clock::Clock;
use crate::error::{DashboardError, DashboardResult};
use crate::frame_composer::FrameComposer;
use crate::log_queue::LogEventReceiver;
use crate::terminal_writer::{clear_line, cursor_previous_line, as_no_wrap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Owns the render thread's private mutable state: `last_num_lines_printed` and the
/// log-event receiver. Neither is shared with any other component, per §5
/// ("Rendering is single-threaded: exactly one scheduled worker owns ticks").
pub struct FrameDriver {
    composer: FrameComposer,
    terminal: crate::terminal_writer::TerminalWriter,
    log_receiver: LogEventReceiver,
    clock: Arc<dyn Clock>,
    last_num_lines_printed: Arc<AtomicUsize>,
    render_interval: Duration,
    stream_dirty: Arc<AtomicBool>,
    shutdown_requested: Arc<AtomicBool>,
}

/// Cloneable external handle used by [`crate::engine::DashboardEngine`] to request
/// shutdown, observe the permanent dirty-stream latch, and force an out-of-cycle
/// render (the only cross-thread call into rendering the dispatcher ever makes,
/// at test-run-finished, per §4.I/§4.M) without owning the driver itself.
#[derive(Clone)]
pub struct FrameDriverHandle {
    stream_dirty: Arc<AtomicBool>,
    shutdown_requested: Arc<AtomicBool>,
    last_num_lines_printed: Arc<AtomicUsize>,
    composer: FrameComposer,
    terminal: crate::terminal_writer::TerminalWriter,
    clock: Arc<dyn Clock>,
}

impl FrameDriverHandle {
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stream_dirty(&self) -> bool {
        self.stream_dirty.load(Ordering::Acquire)
    }

    pub fn last_num_lines_printed(&self) -> usize {
        self.last_num_lines_printed.load(Ordering::Acquire)
    }

    /// Forces one frame render outside the regular tick schedule. Shares the
    /// driver's clear/compose/write logic and its shared clear-sequence state, but
    /// never touches the log-event queue -- that receiver is owned exclusively by
    /// the driver's background task and can't be drained from here.
    pub fn force_render(&self) -> DashboardResult<()> {
        if self.stream_dirty.load(Ordering::Acquire) {
            return Ok(());
        }

        let last_num_lines_printed = self.last_num_lines_printed.load(Ordering::Acquire);
        let clear = if last_num_lines_printed == 0 {
            String::new()
        } else {
            format!("{}{}", cursor_previous_line(last_num_lines_printed), clear_line())
        };

        let now = self.clock.now_ms();
        let lines = self.composer.compose(now);
        self.last_num_lines_printed.store(lines.len(), Ordering::Release);

        if self.terminal.is_dirty_stdout() || self.terminal.is_dirty_stderr() {
            if !self.stream_dirty.swap(true, Ordering::AcqRel) {
                warn!(target: "dashboard::frame_driver", "output stream is dirty; standing down permanently");
            }
            return Ok(());
        }

        if clear.is_empty() && lines.is_empty() {
            return Ok(());
        }

        let mut frame = String::new();
        frame.push_str(&clear);
        let body = lines.join("\n");
        if !body.is_empty() {
            frame.push_str(&as_no_wrap(&body));
            frame.push('\n');
        }

        self.terminal.write_frame(&frame).map_err(|source| {
            error!(target: "dashboard::frame_driver", error = %source, "forced render failed");
            DashboardError::Render(source.to_string())
        })
    }

    /// Writes `block` to stdout as a single write, per §4.I/§4.M: the report that
    /// follows the forced render above.
    pub fn print_stdout_block(&self, block: &str) -> DashboardResult<()> {
        self.terminal
            .write_stdout_block(block)
            .map_err(DashboardError::Io)
    }
}

impl FrameDriver {
    pub fn new(
        composer: FrameComposer,
        terminal: crate::terminal_writer::TerminalWriter,
        log_receiver: LogEventReceiver,
        clock: Arc<dyn Clock>,
        render_interval: Duration,
    ) -> (Self, FrameDriverHandle) {
        let stream_dirty = Arc::new(AtomicBool::new(false));
        let shutdown_requested = Arc::new(AtomicBool::new(false));
        let last_num_lines_printed = Arc::new(AtomicUsize::new(0));
        let handle = FrameDriverHandle {
            stream_dirty: stream_dirty.clone(),
            shutdown_requested: shutdown_requested.clone(),
            last_num_lines_printed: last_num_lines_printed.clone(),
            composer: composer.clone(),
            terminal: terminal.clone(),
            clock: clock.clone(),
        };
        (
            Self {
                composer,
                terminal,
                log_receiver,
                clock,
                last_num_lines_printed,
                render_interval,
                stream_dirty,
                shutdown_requested,
            },
            handle,
        )
    }

    /// One tick, per §4.L. Returns `Ok(true)` if this tick actually emitted a
    /// frame, `Ok(false)` if it stood down because the stream was already dirty.
    pub fn tick(&mut self) -> DashboardResult<bool> {
        let clear = self.build_clear_sequence();
        let now = self.clock.now_ms();
        let lines = self.composer.compose(now);
        let log_lines = self.log_receiver.drain_to_lines();

        self.last_num_lines_printed.store(lines.len(), Ordering::Release);

        if self.terminal.is_dirty_stdout() || self.terminal.is_dirty_stderr() {
            if !self.stream_dirty.swap(true, Ordering::AcqRel) {
                warn!(target: "dashboard::frame_driver", "output stream is dirty; standing down permanently");
            }
            return Ok(false);
        }

        if clear.is_empty() && lines.is_empty() && log_lines.is_empty() {
            return Ok(true);
        }

        let mut frame = String::new();
        frame.push_str(&clear);
        for line in &log_lines {
            frame.push_str(line);
            frame.push('\n');
        }
        let body = lines.join("\n");
        if !body.is_empty() {
            frame.push_str(&as_no_wrap(&body));
            frame.push('\n');
        }

        self.terminal.write_frame(&frame).map_err(|source| {
            error!(target: "dashboard::frame_driver", error = %source, "tick failed to render");
            DashboardError::Render(source.to_string())
        })?;

        Ok(true)
    }

    fn build_clear_sequence(&self) -> String {
        let last_num_lines_printed = self.last_num_lines_printed.load(Ordering::Acquire);
        if last_num_lines_printed == 0 {
            return String::new();
        }
        format!("{}{}", cursor_previous_line(last_num_lines_printed), clear_line())
    }

    /// Runs ticks on `render_interval` until [`FrameDriverHandle::request_shutdown`]
    /// is called or the stream goes dirty, then performs exactly one final render.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.render_interval);
        loop {
            interval.tick().await;
            if self.shutdown_requested.load(Ordering::SeqCst) {
                break;
            }
            debug!(target: "dashboard::frame_driver", "tick");
            match self.tick() {
                Ok(_) => {}
                Err(err) => {
                    error!(target: "dashboard::frame_driver", error = %err, "render tick failed, halting scheduler");
                    break;
                }
            }
            if self.stream_dirty.load(Ordering::Acquire) {
                break;
            }
        }
        let _ = self.tick();
    }
}

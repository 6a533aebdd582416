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

//! Unbounded log-event queue interleaved above the status frame.
//!
//! Modeled on the teacher's `SharedWriter` channel: an unbounded
//! `tokio::sync::mpsc` sender cloned out to every ingestion thread, with a single
//! consumer (the frame driver) draining it on each tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConsoleEvent {
    pub level: ConsoleLevel,
    pub message: String,
    pub ansi_prebaked: bool,
}

#[derive(Debug, Default)]
struct LatchesInner {
    any_warnings_printed: AtomicBool,
    any_errors_printed: AtomicBool,
}

/// The two one-way latches set by draining WARN/ERROR events. Never reset for the
/// lifetime of the engine -- once a warning has printed, the compressed thread view
/// stays one line shorter for the rest of the run (see §4.L).
#[derive(Debug, Clone, Default)]
pub struct PrintedLatches {
    inner: Arc<LatchesInner>,
}

impl PrintedLatches {
    pub fn any_warnings_printed(&self) -> bool {
        self.inner.any_warnings_printed.load(Ordering::Relaxed)
    }

    pub fn any_errors_printed(&self) -> bool {
        self.inner.any_errors_printed.load(Ordering::Relaxed)
    }

    fn mark_warning(&self) {
        self.inner.any_warnings_printed.store(true, Ordering::Relaxed);
    }

    fn mark_error(&self) {
        self.inner.any_errors_printed.store(true, Ordering::Relaxed);
    }
}

/// Clonable producer handle. Every ingestion thread holds one of these rather than
/// the raw `mpsc::UnboundedSender`, so `dispatcher.rs` never has to know the queue
/// is a channel at all.
#[derive(Debug, Clone)]
pub struct LogEventSender {
    sender: mpsc::UnboundedSender<ConsoleEvent>,
}

impl LogEventSender {
    pub fn send(&self, event: ConsoleEvent) {
        // The only way this fails is if the receiver (owned by the frame driver)
        // has already been dropped, which only happens after engine shutdown; a
        // log line arriving after shutdown has nowhere useful to go.
        let _ = self.sender.send(event);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(ConsoleEvent {
            level: ConsoleLevel::Info,
            message: message.into(),
            ansi_prebaked: false,
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.send(ConsoleEvent {
            level: ConsoleLevel::Warn,
            message: message.into(),
            ansi_prebaked: false,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(ConsoleEvent {
            level: ConsoleLevel::Error,
            message: message.into(),
            ansi_prebaked: false,
        });
    }
}

/// Single-consumer drain side, owned by the frame driver.
pub struct LogEventReceiver {
    receiver: mpsc::UnboundedReceiver<ConsoleEvent>,
    latches: PrintedLatches,
}

/// Applies a message's level-appropriate ANSI wrapping, unless the event already
/// carries pre-baked ANSI (per §4.H, "a message with embedded ANSI is written as-is").
fn style_message(event: &ConsoleEvent) -> String {
    use crossterm::style::Stylize;

    if event.ansi_prebaked {
        return event.message.clone();
    }

    match event.level {
        ConsoleLevel::Info => event.message.clone(),
        ConsoleLevel::Warn => event.message.clone().yellow().to_string(),
        ConsoleLevel::Error => event.message.clone().red().bold().to_string(),
    }
}

impl LogEventReceiver {
    /// Drains every currently-queued event into a flat list of display-ready lines
    /// (a message is split at embedded newlines first, per §4.H, so the caller's
    /// line count matches what actually gets printed), updating the warning/error
    /// latches along the way.
    pub fn drain_to_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            match event.level {
                ConsoleLevel::Warn => self.latches.mark_warning(),
                ConsoleLevel::Error => self.latches.mark_error(),
                ConsoleLevel::Info => {}
            }
            let styled = style_message(&event);
            lines.extend(styled.split('\n').map(str::to_string));
        }
        lines
    }

    pub fn latches(&self) -> &PrintedLatches {
        &self.latches
    }
}

pub fn channel() -> (LogEventSender, LogEventReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        LogEventSender { sender },
        LogEventReceiver {
            receiver,
            latches: PrintedLatches::default(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drain_splits_embedded_newlines() {
        let (sender, mut receiver) = channel();
        sender.info("line one\nline two");
        let lines = receiver.drain_to_lines();
        assert_eq!(lines, vec!["line one", "line two"]);
    }

    #[test]
    fn warn_sets_warning_latch_only() {
        let (sender, mut receiver) = channel();
        sender.warn("careful");
        receiver.drain_to_lines();
        assert!(receiver.latches().any_warnings_printed());
        assert!(!receiver.latches().any_errors_printed());
    }

    #[test]
    fn error_sets_error_latch() {
        let (sender, mut receiver) = channel();
        sender.error("boom");
        receiver.drain_to_lines();
        assert!(receiver.latches().any_errors_printed());
    }

    #[test]
    fn latches_stay_set_after_further_info_events() {
        let (sender, mut receiver) = channel();
        sender.error("boom");
        receiver.drain_to_lines();
        sender.info("all quiet now");
        receiver.drain_to_lines();
        assert!(receiver.latches().any_errors_printed());
    }

    #[test]
    fn prebaked_ansi_message_is_passed_through_untouched() {
        let (sender, mut receiver) = channel();
        sender.send(ConsoleEvent {
            level: ConsoleLevel::Error,
            message: "\u{1b}[31mcustom\u{1b}[0m".to_string(),
            ansi_prebaked: true,
        });
        let lines = receiver.drain_to_lines();
        assert_eq!(lines, vec!["\u{1b}[31mcustom\u{1b}[0m"]);
    }

    #[test]
    fn empty_queue_drains_to_no_lines() {
        let (_sender, mut receiver) = channel();
        assert!(receiver.drain_to_lines().is_empty());
    }
}

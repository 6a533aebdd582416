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

//! Wraps stdout/stderr with dirty-stream detection and ANSI styling helpers.
//!
//! A foreign writer (some other part of the process writing straight to stdout or
//! stderr while the dashboard owns the screen) corrupts the redraw-in-place
//! illusion the frame driver depends on. Mirrors `SharedWriter`'s `Write` impl for
//! the write path, adding the dirty latch the frame driver checks every tick.

use crossterm::style::Stylize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

#[derive(Debug, Default)]
struct StreamGuardInner {
    dirty: AtomicBool,
}

/// One side (stdout or stderr) of [`TerminalWriter`]. Cloneable; all clones share
/// the same dirty latch and underlying stream lock.
#[derive(Clone)]
struct StreamGuard<W: Write> {
    stream: Arc<StdMutex<W>>,
    inner: Arc<StreamGuardInner>,
}

impl<W: Write> StreamGuard<W> {
    fn new(stream: W) -> Self {
        Self {
            stream: Arc::new(StdMutex::new(stream)),
            inner: Arc::new(StreamGuardInner::default()),
        }
    }

    fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    /// Write performed by the frame driver itself: does not mark the stream dirty.
    fn write_frame(&self, payload: &str) -> io::Result<()> {
        let mut guard = self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.write_all(payload.as_bytes())?;
        guard.flush()
    }

    /// Write performed by anything other than the frame driver: marks the stream
    /// dirty, per §4.A ("all other writes through the same wrappers do").
    fn write_foreign(&self, payload: &[u8]) -> io::Result<usize> {
        self.inner.dirty.store(true, Ordering::Release);
        let mut guard = self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.write_all(payload)?;
        guard.flush()?;
        Ok(payload.len())
    }
}

/// A `Write` handle onto one of [`TerminalWriter`]'s streams, for callers that want
/// ordinary `std::io::Write`-compatible access (e.g. feeding into `tracing-appender`
/// or another logger) without going through the frame-driver-only methods.
#[derive(Clone)]
pub struct ForeignWriteHandle<W: Write> {
    guard: StreamGuard<W>,
}

impl<W: Write> Write for ForeignWriteHandle<W> {
    fn write(&mut self, payload: &[u8]) -> io::Result<usize> {
        self.guard.write_foreign(payload)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Wraps stdout and stderr, tracking whether anything other than the frame driver
/// has written to either since construction.
#[derive(Clone)]
pub struct TerminalWriter {
    stdout: StreamGuard<io::Stdout>,
    stderr: StreamGuard<io::Stderr>,
}

impl Default for TerminalWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalWriter {
    pub fn new() -> Self {
        Self {
            stdout: StreamGuard::new(io::stdout()),
            stderr: StreamGuard::new(io::stderr()),
        }
    }

    pub fn is_dirty_stdout(&self) -> bool {
        self.stdout.is_dirty()
    }

    pub fn is_dirty_stderr(&self) -> bool {
        self.stderr.is_dirty()
    }

    /// Frame-driver-only write, on stderr per §4.L step 7 ("emit ... in a single
    /// print call on stderr").
    pub fn write_frame(&self, frame: &str) -> io::Result<()> {
        self.stderr.write_frame(frame)
    }

    /// A stdout write that is *not* considered part of the frame (e.g. the test
    /// aggregator's final block dump, §4.I): does not trip the dirty latch.
    pub fn write_stdout_block(&self, block: &str) -> io::Result<()> {
        self.stdout.write_frame(block)
    }

    pub fn foreign_stdout_handle(&self) -> ForeignWriteHandle<io::Stdout> {
        ForeignWriteHandle {
            guard: self.stdout.clone(),
        }
    }

    pub fn foreign_stderr_handle(&self) -> ForeignWriteHandle<io::Stderr> {
        ForeignWriteHandle {
            guard: self.stderr.clone(),
        }
    }
}

pub fn cursor_previous_line(n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    format!("\x1b[{n}F")
}

pub fn clear_line() -> &'static str {
    "\x1b[2K"
}

pub fn as_warning(s: &str) -> String {
    s.to_string().yellow().to_string()
}

pub fn as_error(s: &str) -> String {
    s.to_string().red().bold().to_string()
}

/// Marks a line as "do not wrap" via the DECAWM-adjacent private escape most
/// terminal emulators honor for single logical lines; falls back to a no-op prefix
/// sequence that's safe even on emulators that ignore it.
pub fn as_no_wrap(s: &str) -> String {
    format!("\x1b[?7l{s}\x1b[?7h")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cursor_previous_line_zero_is_empty() {
        assert_eq!(cursor_previous_line(0), "");
    }

    #[test]
    fn cursor_previous_line_formats_count() {
        assert_eq!(cursor_previous_line(3), "\x1b[3F");
    }

    #[test]
    fn as_no_wrap_brackets_the_payload() {
        let wrapped = as_no_wrap("hello");
        assert!(wrapped.starts_with("\x1b[?7l"));
        assert!(wrapped.ends_with("\x1b[?7h"));
        assert!(wrapped.contains("hello"));
    }

    #[test]
    fn frame_write_does_not_mark_dirty() {
        let writer = TerminalWriter::new();
        // Frame writes go to stderr; writing an empty frame is a no-op on the
        // underlying stream but must never touch the dirty latch.
        writer.write_frame("").unwrap();
        assert!(!writer.is_dirty_stderr());
    }

    #[test]
    fn foreign_write_marks_dirty() {
        let writer = TerminalWriter::new();
        let mut handle = writer.foreign_stderr_handle();
        handle.write_all(b"").unwrap();
        assert!(writer.is_dirty_stderr());
    }

    #[test]
    fn stdout_and_stderr_dirty_flags_are_independent() {
        let writer = TerminalWriter::new();
        let mut handle = writer.foreign_stdout_handle();
        handle.write_all(b"").unwrap();
        assert!(writer.is_dirty_stdout());
        assert!(!writer.is_dirty_stderr());
    }
}

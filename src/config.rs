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

//! Layered configuration, in the teacher's "sane defaults, override via builder"
//! style (cf. `TracingConfig`, `SpinnerStyle` in `terminal_async`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestResultVerbosity {
    Summary,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_thread_line_limit: usize,
    pub thread_line_limit_on_warning: usize,
    pub thread_line_limit_on_error: usize,
    pub always_sort_threads_by_time: bool,
    pub render_interval_ms: u64,
    pub test_result_verbosity: TestResultVerbosity,
    pub test_log_path: Option<String>,
    pub http_server_port: Option<u16>,
    pub time_zone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_thread_line_limit: 8,
            thread_line_limit_on_warning: 4,
            thread_line_limit_on_error: 2,
            always_sort_threads_by_time: false,
            render_interval_ms: 150,
            test_result_verbosity: TestResultVerbosity::Summary,
            test_log_path: None,
            http_server_port: None,
            time_zone: "UTC".to_string(),
        }
    }
}

impl Config {
    /// The thread-line cap for the current tick, per §4.L: warnings and errors
    /// only ever shrink the cap, and an error limit more severe than a warning
    /// limit still wins even if warnings also fired this run.
    pub fn effective_thread_line_limit(&self, any_warnings_printed: bool, any_errors_printed: bool) -> usize {
        let mut limit = self.default_thread_line_limit;
        if any_warnings_printed {
            limit = limit.min(self.thread_line_limit_on_warning);
        }
        if any_errors_printed {
            limit = limit.min(self.thread_line_limit_on_error);
        }
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.default_thread_line_limit, config.default_thread_line_limit);
    }

    #[test]
    fn no_latches_keeps_default_limit() {
        let config = Config::default();
        assert_eq!(
            config.effective_thread_line_limit(false, false),
            config.default_thread_line_limit
        );
    }

    #[test]
    fn error_limit_wins_over_warning_limit() {
        let config = Config::default();
        assert_eq!(
            config.effective_thread_line_limit(true, true),
            config.thread_line_limit_on_error
        );
    }

    #[test]
    fn partial_json_fills_remaining_fields_from_default() {
        let parsed: Config = serde_json::from_str(r#"{"render_interval_ms": 250}"#).unwrap();
        assert_eq!(parsed.render_interval_ms, 250);
        assert_eq!(parsed.default_thread_line_limit, Config::default().default_thread_line_limit);
    }
}

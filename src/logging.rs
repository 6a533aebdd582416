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

//! Wires up `tracing` for the engine's own operational log, distinct from the
//! `ConsoleEvent`s rendered into the dashboard frame itself.
//!
//! Mirrors `terminal_async::tracing_logging::tracing_setup::init`: a display layer
//! plus an optional rolling file layer, both gated by one level filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

type DynLayer = dyn Layer<tracing_subscriber::Registry> + Send + Sync + 'static;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTarget {
    Stdout,
    Stderr,
    None,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: tracing::Level,
    pub display: DisplayTarget,
    pub log_file_dir: Option<String>,
    pub log_file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            display: DisplayTarget::None,
            log_file_dir: None,
            log_file_prefix: "dashboard".to_string(),
        }
    }
}

/// Guard returned by [`init`]; dropping it flushes the non-blocking file appender.
/// Callers must hold this for the lifetime of the process, exactly like
/// `tracing_appender::non_blocking`'s own guard.
#[must_use]
pub struct LoggingGuard {
    _file_appender_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

pub fn init(config: LoggingConfig) -> miette::Result<LoggingGuard> {
    let env_filter = EnvFilter::try_new(config.level.to_string()).unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<Box<DynLayer>> = vec![Box::new(env_filter)];

    match config.display {
        DisplayTarget::Stdout => layers.push(Box::new(
            tracing_subscriber::fmt::layer().with_writer(std::io::stdout).with_target(true),
        )),
        DisplayTarget::Stderr => layers.push(Box::new(
            tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(true),
        )),
        DisplayTarget::None => {}
    }

    let guard = match &config.log_file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.log_file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            layers.push(Box::new(
                tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false),
            ));
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|err| miette::miette!("failed to install tracing subscriber: {err}"))?;

    Ok(LoggingGuard {
        _file_appender_guard: guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_file_sink() {
        let config = LoggingConfig::default();
        assert!(config.log_file_dir.is_none());
        assert_eq!(config.display, DisplayTarget::None);
    }
}

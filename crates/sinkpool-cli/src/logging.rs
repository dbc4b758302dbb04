//! Logging setup for the sinkpool binary
//!
//! Console output goes to stderr so that `sinkpool listen` can stream the
//! records it receives on stdout. JSON logs are optional and roll daily.

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// The `[logging]` table of `sinkpool.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directives; `RUST_LOG` takes precedence
    pub filter: String,

    /// Whether to log to stderr
    pub console: bool,

    /// Whether to write JSON logs to `log_dir`
    pub json: bool,

    /// Directory for JSON log files, see [`default_log_directory`]
    pub log_dir: Option<PathBuf>,

    /// Whether to include file/line information in console logs
    pub include_location: bool,

    /// Whether to log span open/close events
    pub spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn,sinkpool=info,sinkpool_connection=info".to_string(),
            console: true,
            json: false,
            log_dir: None,
            include_location: false,
            spans: false,
        }
    }
}

impl LoggingConfig {
    /// Directory JSON logs are written to
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_directory)
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter))
    }
}

/// `<data_local_dir>/sinkpool/logs`, or `./sinkpool/logs` when the platform has none
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sinkpool")
        .join("logs")
}

/// Install the global tracing subscriber.
///
/// When JSON logging is enabled the returned guard flushes the background
/// writer on drop, so hold it until the process exits.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    // NEW fires once per span; ENTER would repeat on every poll of an awaited future.
    let span_events = if config.spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut guard = None;

    if config.console {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_writer(std::io::stderr)
            .with_filter(config.env_filter())
            .boxed();

        layers.push(console_layer);
    }

    if config.json {
        let log_dir = config.log_dir();
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "sinkpool.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(config.env_filter())
            .boxed();

        layers.push(json_layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("logging was already initialized")?;

    tracing::debug!(
        console = config.console,
        json = config.json,
        log_dir = %config.log_dir().display(),
        "logging initialized"
    );

    Ok(guard)
}

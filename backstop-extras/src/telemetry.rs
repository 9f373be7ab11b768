//! Telemetry and tracing utilities
//!
//! Installs a global `tracing` subscriber that shows what the retry
//! coordinators and refresh channels are doing: scheduled attempts,
//! exhausted budgets, coalesced fires.
//!
//! ## Example
//!
//! ```rust,ignore
//! use backstop_extras::telemetry::{init_subscriber, OutputFormat, SubscriberConfig};
//!
//! // Human-readable output on stderr at INFO
//! init_subscriber(SubscriberConfig::default())?;
//!
//! // JSON lines to a file; keep the guard alive until shutdown
//! let _guard = init_subscriber(SubscriberConfig::production("backstop.log".into()))?;
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::{ExtrasError, Result};

/// Environment variable holding the log level.
pub const ENV_LOG_LEVEL: &str = "BACKSTOP_LOG_LEVEL";
/// Environment variable holding the output format.
pub const ENV_LOG_FORMAT: &str = "BACKSTOP_LOG_FORMAT";
/// Environment variable holding the log file path.
pub const ENV_LOG_FILE: &str = "BACKSTOP_LOG_FILE";

/// Crates whose events the installed filter lets through.
const TARGETS: [&str; 4] = ["backstop", "backstop_core", "backstop_spec", "backstop_extras"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON objects with span context
    Json,
    /// JSON objects with event fields flattened to the top level
    JsonCompact,
}

impl FromStr for OutputFormat {
    type Err = ExtrasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "json-compact" => Ok(Self::JsonCompact),
            _ => Err(ExtrasError::TelemetryInit(format!(
                "Invalid log format: {s}. Valid options: text, json, json-compact"
            ))),
        }
    }
}

/// Configuration for tracing subscriber
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Log level
    pub log_level: tracing::Level,
    /// Output format
    pub output_format: OutputFormat,
    /// Enable console output
    pub enable_console: bool,
    /// Log file path (optional)
    pub log_file: Option<PathBuf>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            enable_console: true,
            log_file: None,
        }
    }
}

impl SubscriberConfig {
    /// Create a new builder for SubscriberConfig
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    /// Debug level, text on the console.
    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            ..Self::default()
        }
    }

    /// Warnings and above as JSON into `log_file`, console off.
    pub fn production(log_file: PathBuf) -> Self {
        Self {
            log_level: tracing::Level::WARN,
            output_format: OutputFormat::Json,
            enable_console: false,
            log_file: Some(log_file),
        }
    }

    /// Build a configuration from `BACKSTOP_LOG_*` style variables resolved
    /// through `lookup`. Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            builder = builder.log_level_str(&level)?;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            builder = builder.output_format(format.parse()?);
        }
        if let Some(path) = lookup(ENV_LOG_FILE) {
            builder = builder.log_file(PathBuf::from(path));
        }

        Ok(builder.build())
    }
}

/// Builder for SubscriberConfig
#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
    enable_console: Option<bool>,
    log_file: Option<PathBuf>,
}

impl SubscriberConfigBuilder {
    /// Set the log level
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the log level from a string
    pub fn log_level_str(mut self, level: &str) -> Result<Self> {
        let level = match level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                return Err(ExtrasError::TelemetryInit(format!(
                    "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
                )));
            }
        };
        self.log_level = Some(level);
        Ok(self)
    }

    /// Set the output format
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Enable or disable console output
    pub fn enable_console(mut self, enable: bool) -> Self {
        self.enable_console = Some(enable);
        self
    }

    /// Set the log file path
    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    /// Build the configuration
    pub fn build(self) -> SubscriberConfig {
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
            enable_console: self.enable_console.unwrap_or(true),
            log_file: self.log_file,
        }
    }
}

fn level_name(level: tracing::Level) -> &'static str {
    match level {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    }
}

/// `EnvFilter` directive enabling `level` for every backstop crate.
pub fn filter_directive(level: tracing::Level) -> String {
    let level = level_name(level);
    TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn formatted<W>(
    layer: fmt::Layer<Registry, DefaultFields, Format, W>,
    format: OutputFormat,
) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        OutputFormat::Text => layer.with_target(true).boxed(),
        OutputFormat::Json => layer
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed(),
        OutputFormat::JsonCompact => layer
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .boxed(),
    }
}

/// Open `path` for appending behind a non-blocking writer.
fn open_log_file(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path.file_name().ok_or_else(|| {
        ExtrasError::TelemetryInit(format!("Log file path has no file name: {}", path.display()))
    })?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .map_err(|e| ExtrasError::TelemetryInit(format!("Failed to open log file: {e}")))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize tracing subscriber with the given configuration
///
/// ## Returns
///
/// - `Ok(Some(WorkerGuard))` when file logging is enabled. The guard flushes
///   the file writer on drop and must outlive the program's logging.
/// - `Ok(None)` for console-only output, or when a global subscriber was
///   already installed.
/// - `Err(ExtrasError::TelemetryInit)` if no output is enabled, the filter
///   is invalid, or the log file cannot be opened.
pub fn init_subscriber(config: SubscriberConfig) -> Result<Option<WorkerGuard>> {
    if !config.enable_console && config.log_file.is_none() {
        return Err(ExtrasError::TelemetryInit(
            "Console output is disabled and no log file is set".to_string(),
        ));
    }

    let filter = EnvFilter::try_new(filter_directive(config.log_level))
        .map_err(|e| ExtrasError::TelemetryInit(format!("Invalid filter: {e}")))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.enable_console {
        layers.push(formatted(
            fmt::layer().with_writer(std::io::stderr),
            config.output_format,
        ));
    }

    let mut guard = None;
    if let Some(path) = &config.log_file {
        let (writer, file_guard) = open_log_file(path)?;
        layers.push(formatted(
            fmt::layer().with_ansi(false).with_writer(writer),
            config.output_format,
        ));
        guard = Some(file_guard);
    }

    let init_result = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();

    match init_result {
        Ok(()) => Ok(guard),
        Err(e) => {
            let error_msg = e.to_string();
            if error_msg.contains("global default trace dispatcher has already been set") {
                // Someone else owns the global subscriber; nothing to flush.
                Ok(None)
            } else {
                Err(ExtrasError::TelemetryInit(format!(
                    "Failed to initialize tracing: {e}"
                )))
            }
        }
    }
}

/// Initialize tracing subscriber with default configuration
pub fn init_default() -> Result<Option<WorkerGuard>> {
    init_subscriber(SubscriberConfig::default())
}

/// Initialize tracing subscriber for debugging
pub fn init_debug() -> Result<Option<WorkerGuard>> {
    init_subscriber(SubscriberConfig::debug())
}

/// Initialize tracing subscriber for production
pub fn init_production(log_file: PathBuf) -> Result<Option<WorkerGuard>> {
    init_subscriber(SubscriberConfig::production(log_file))
}

/// Initialize tracing subscriber from environment variables
///
/// Supported environment variables:
/// - `BACKSTOP_LOG_LEVEL`: Log level (trace, debug, info, warn, error)
/// - `BACKSTOP_LOG_FORMAT`: Output format (text, json, json-compact)
/// - `BACKSTOP_LOG_FILE`: Log file path
pub fn init_from_env() -> Result<Option<WorkerGuard>> {
    let config = SubscriberConfig::from_lookup(|key| std::env::var(key).ok())?;
    init_subscriber(config)
}

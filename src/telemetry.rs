//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; applications that want them printed can call
//! one of the `init_*` functions once at startup.
//!
//! ## Example
//!
//! ```rust,no_run
//! use llm_relay::telemetry::{OutputFormat, SubscriberConfig, init_subscriber};
//!
//! let config = SubscriberConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! let _guard = init_subscriber(config).expect("tracing init");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_LEVEL_ENV: &str = "LLM_RELAY_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "LLM_RELAY_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "LLM_RELAY_LOG_FILE";

#[derive(Debug, thiserror::Error)]
#[error("Telemetry init error: {0}")]
pub struct TelemetryError(String);

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonCompact,
}

impl std::str::FromStr for OutputFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "json-compact" => Ok(Self::JsonCompact),
            other => Err(TelemetryError(format!(
                "Invalid log format: {other}. Valid options: text, json, json-compact"
            ))),
        }
    }
}

/// Configuration for the tracing subscriber
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub log_level: tracing::Level,
    pub output_format: OutputFormat,
    /// Write to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            log_file: None,
        }
    }
}

impl SubscriberConfig {
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            ..Self::default()
        }
    }

    /// Filter directive scoped to this crate, e.g. `llm_relay=debug`.
    pub fn filter_directive(&self) -> String {
        format!("llm_relay={}", level_str(self.log_level))
    }
}

#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
    log_file: Option<PathBuf>,
}

impl SubscriberConfigBuilder {
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn log_level_str(mut self, level: &str) -> Result<Self> {
        let level = match level.trim().to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                return Err(TelemetryError(format!(
                    "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
                )));
            }
        };
        self.log_level = Some(level);
        Ok(self)
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn build(self) -> SubscriberConfig {
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
            log_file: self.log_file,
        }
    }
}

const fn level_str(level: tracing::Level) -> &'static str {
    match level {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    }
}

/// Install a global fmt subscriber.
///
/// Returns the file writer's guard when `log_file` is set; keep it alive or buffered lines
/// are lost. A subscriber that is already installed is left in place.
pub fn init_subscriber(config: SubscriberConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(config.filter_directive())
        .map_err(|e| TelemetryError(format!("Invalid filter: {e}")))?;

    let (writer, guard) = match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| TelemetryError(format!("Invalid log file: {}", path.display())))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = config.log_file.is_none();

    let init_result = match config.output_format {
        OutputFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .try_init(),
        OutputFormat::JsonCompact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .json()
            .flatten_event(true)
            .try_init(),
        OutputFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .try_init(),
    };

    match init_result {
        Ok(()) => Ok(guard),
        Err(e) => {
            // Either the dispatcher or the `log` bridge may be the part already taken.
            let msg = e.to_string();
            if msg.contains("has already been set") || msg.contains("already initialized") {
                Ok(None)
            } else {
                Err(TelemetryError(format!("Failed to initialize tracing: {e}")))
            }
        }
    }
}

pub fn init_default() -> Result<Option<WorkerGuard>> {
    init_subscriber(SubscriberConfig::default())
}

/// Initialize from `LLM_RELAY_LOG_LEVEL` (trace..error), `LLM_RELAY_LOG_FORMAT`
/// (text, json, json-compact) and `LLM_RELAY_LOG_FILE`.
pub fn init_from_env() -> Result<Option<WorkerGuard>> {
    init_subscriber(config_from_lookup(|key| std::env::var(key).ok())?)
}

fn config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<SubscriberConfig> {
    let mut builder = SubscriberConfig::builder();
    if let Some(level) = lookup(LOG_LEVEL_ENV) {
        builder = builder.log_level_str(&level)?;
    }
    if let Some(format) = lookup(LOG_FORMAT_ENV) {
        builder = builder.output_format(format.parse()?);
    }
    if let Some(path) = lookup(LOG_FILE_ENV) {
        builder = builder.log_file(path);
    }
    Ok(builder.build())
}

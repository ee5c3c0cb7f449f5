//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use hookwire_core::{PatternRule, Settings, WebhookRule};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookwireConfig {
    /// Log output settings.
    pub logging: LoggingConfig,

    /// Automation settings, shared with the router and transport at runtime.
    pub automation: Settings,

    /// Event routing settings.
    pub router: RouterConfig,

    /// Legacy `Task:` / `Description:` webhook.
    pub legacy: LegacyConfig,

    /// User pattern rules, registered after the built-in ones.
    pub parsers: Vec<PatternRule>,

    /// Persisted webhook rules, registered in order.
    pub webhooks: Vec<WebhookRule>,
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the directive spelling of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Newline-delimited JSON; requires the `json-log` feature.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Append to `logging.file_path`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level, overridden by `RUST_LOG`.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub span_events: SpanEventConfig,
    /// Log file for [`LogOutput::File`].
    pub file_path: Option<PathBuf>,
    /// Per-target levels, e.g. `hookwire_transport = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            span_events: SpanEventConfig::default(),
            file_path: None,
            filters: BTreeMap::new(),
            thread_ids: false,
            file_location: false,
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Event routing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Events older than this before startup are ignored.
    pub catch_up_window_ms: u64,

    /// Capacity of the inbound event channel.
    pub queue_capacity: usize,

    /// Capacity of each room's worker queue. Events for a full room are dropped.
    pub room_queue_capacity: usize,

    /// A room worker with no events for this long is stopped.
    pub room_idle_timeout_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            catch_up_window_ms: 60_000,
            queue_capacity: 256,
            room_queue_capacity: 32,
            room_idle_timeout_ms: 300_000,
        }
    }
}

impl RouterConfig {
    /// The catch-up window as a duration.
    pub fn catch_up_window(&self) -> Duration {
        Duration::from_millis(self.catch_up_window_ms)
    }

    /// The room worker idle timeout as a duration.
    pub fn room_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.room_idle_timeout_ms)
    }
}

// =============================================================================
// Legacy
// =============================================================================

/// Legacy task webhook configuration.
///
/// Usually populated from the `MAKE_WEBHOOK_URL` environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    pub webhook_url: Option<String>,
}

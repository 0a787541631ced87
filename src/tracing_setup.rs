//! Subscriber installation for programs built on the handoff layer.
//!
//! The structures only emit `tracing` events. The bridge producer runs inside
//! a `push_bridge` span on a named thread, so thread names are on by default
//! and span events can be switched on to see each bridge start and stop.
//!
//! `RUST_LOG` directives are honored; the configured level is the fallback
//! when it is unset.
//!
//! # Example
//! ```no_run
//! use daq_handoff::{config::HandoffConfig, tracing_setup};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HandoffConfig::load()?;
//! tracing_setup::init_from_config(&config)?;
//!
//! info!(capacity = config.queue.capacity, "handoff layer ready");
//! # Ok(())
//! # }
//! ```

use crate::config::HandoffConfig;
use crate::error::{HandoffError, HandoffResult};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Line format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Multi-line, colored when ANSI is enabled.
    Pretty,
    /// One line per event, never colored.
    Compact,
    /// One JSON object per event.
    Json,
}

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    pub format: OutputFormat,
    /// Emit an event when a span opens and closes.
    pub with_span_events: bool,
    pub with_file_and_line: bool,
    pub with_thread_names: bool,
    /// Only honored by [`OutputFormat::Pretty`].
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl TracingConfig {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: OutputFormat::Compact,
            with_span_events: false,
            with_file_and_line: false,
            with_thread_names: true,
            with_ansi: true,
        }
    }

    /// Options taken from the `[logging]` section.
    ///
    /// # Errors
    /// `ConfigValidation` if the level is not a tracing level name.
    pub fn from_handoff_config(config: &HandoffConfig) -> HandoffResult<Self> {
        parse_log_level(&config.logging.level).map(Self::new)
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }

    fn format_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.with_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_span_events(span_events)
            .with_file(self.with_file_and_line)
            .with_line_number(self.with_file_and_line)
            .with_thread_names(self.with_thread_names)
            .with_ansi(self.with_ansi && self.format == OutputFormat::Pretty);
        match self.format {
            OutputFormat::Pretty => base.pretty().boxed(),
            OutputFormat::Compact => base.compact().boxed(),
            OutputFormat::Json => base.json().boxed(),
        }
    }
}

/// Install a subscriber configured by the `[logging]` section.
pub fn init_from_config(config: &HandoffConfig) -> HandoffResult<()> {
    init(TracingConfig::from_handoff_config(config)?)
}

/// Install the global subscriber.
///
/// Returns `Ok(())` without changes when a global subscriber already exists.
///
/// # Errors
/// `ConfigValidation` if installation fails for any other reason.
pub fn init(config: TracingConfig) -> HandoffResult<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }
    tracing_subscriber::registry()
        .with(config.format_layer().with_filter(config.filter()))
        .try_init()
        .or_else(|err| {
            // Lost a race with another thread installing its own.
            if tracing::dispatcher::has_been_set() {
                Ok(())
            } else {
                Err(HandoffError::ConfigValidation(format!(
                    "cannot install tracing subscriber: {err}"
                )))
            }
        })
}

fn parse_log_level(level: &str) -> HandoffResult<Level> {
    level.trim().parse().map_err(|_| {
        HandoffError::ConfigValidation(format!(
            "invalid log level '{level}', expected trace, debug, info, warn or error"
        ))
    })
}

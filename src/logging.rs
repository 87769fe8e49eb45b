//! Logging setup for the resolution core
//!
//! The crate emits structured `tracing` events under the `syringa`
//! target: definition registration at DEBUG, per-step resolution flow at
//! TRACE. This module wires up a subscriber for applications that do not
//! configure their own.
//!
//! # Features
//!
//! - `logging` - emit events (default)
//! - `logging-pretty` - colorful human-readable subscriber
//! - `logging-json` - JSON subscriber for aggregation pipelines
//!
//! # Example
//!
//! ```rust,ignore
//! use syringa::logging;
//!
//! logging::builder()
//!     .trace()
//!     .core_only()
//!     .init();
//! ```

#[cfg(feature = "logging")]
use tracing::Level;

/// Output format for the bundled subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact single-line output
    #[default]
    Compact,
    /// Colorful multi-line output for development
    Pretty,
    /// JSON structured output for production
    Json,
}

/// Builder for the bundled subscriber
#[cfg(feature = "logging")]
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
}

#[cfg(feature = "logging")]
impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Compact,
            target: None,
        }
    }
}

#[cfg(feature = "logging")]
impl LoggingBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Record per-step resolution flow
    pub fn trace(mut self) -> Self {
        self.level = Level::TRACE;
        self
    }

    /// Record registrations and cache events
    pub fn debug(mut self) -> Self {
        self.level = Level::DEBUG;
        self
    }

    /// Only show events from this crate
    pub fn core_only(self) -> Self {
        self.with_target_filter("syringa")
    }

    /// Filter to one target
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Use pretty output
    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    /// Use JSON output
    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    /// Use compact output
    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Install the subscriber.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = if let Some(target) = self.target {
            EnvFilter::new(format!("{}={}", target, self.level))
        } else {
            EnvFilter::new(self.level.to_string())
        };

        match self.format {
            LogFormat::Json => {
                #[cfg(feature = "logging-json")]
                {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json().with_target(true))
                        .init();
                }
                #[cfg(not(feature = "logging-json"))]
                {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().with_target(true))
                        .init();
                }
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty().with_target(true))
                    .init();
            }
            LogFormat::Compact => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact().with_target(true))
                    .init();
            }
        }
    }

    /// Install the subscriber (no-op without a subscriber feature).
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {
        // Requires logging-pretty or logging-json.
    }
}

/// Create a subscriber builder
#[cfg(feature = "logging")]
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install a subscriber with default settings
#[cfg(feature = "logging")]
pub fn init() {
    builder().debug().init();
}

#[cfg(all(test, feature = "logging"))]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = LoggingBuilder::default();
        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Compact);
        assert!(builder.target.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let builder = LoggingBuilder::new().trace().json().core_only();
        assert_eq!(builder.level, Level::TRACE);
        assert_eq!(builder.format, LogFormat::Json);
        assert_eq!(builder.target, Some("syringa"));
    }
}

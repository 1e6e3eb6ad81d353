//! Structured logging using the tracing crate
//!
//! Provides contextual, machine-readable logging with span macros for the
//! terminal's device and checkout operations.
//!
//! ## Log Format Options
//!
//! The output format is controlled by the `LOG_FORMAT` environment variable:
//!
//! - `json` - Structured JSON for log shipping
//! - `pretty` - Human-readable with colors and indentation
//! - `compact` - Terminal-friendly with minimal spacing
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE) - defaults to INFO
//! - `LOG_FORMAT`: Output format (json, pretty, compact) - defaults to json
//! - `LOG_SPANS`: Include span open/close events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering entirely
//!
//! ## Examples
//!
//! ```bash
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG ./pos-terminal run
//! LOG_FORMAT=compact ./pos-terminal hdm operators
//! ```

use std::env;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// Parse log format from string, falling back to JSON
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Parse a `LOG_LEVEL` value, falling back to INFO
pub fn parse_level(s: &str) -> Level {
    match s.to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Dependencies that are only interesting when something is wrong
const QUIET_TARGETS: &[&str] = &["hyper=warn", "warp=warn", "tokio=warn", "mio=warn"];

fn build_filter(level: Level) -> EnvFilter {
    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }

    QUIET_TARGETS
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(EnvFilter::new(level.to_string()), |filter, directive| {
            filter.add_directive(directive)
        })
}

fn span_events(include_spans: bool) -> fmt::format::FmtSpan {
    if include_spans {
        fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
    } else {
        fmt::format::FmtSpan::NONE
    }
}

/// Initialize logging with manual configuration
///
/// Calling this twice is harmless; the second subscriber is ignored.
pub fn init_logging(level: Level, format: LogFormat, include_spans: bool) {
    let subscriber = tracing_subscriber::registry().with(build_filter(level));

    let result = match format {
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events(include_spans)),
            )
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(true)
                    .with_span_events(span_events(include_spans)),
            )
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_span_events(span_events(include_spans)),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// Initialize logging from environment variables
pub fn init_default_logging() {
    let level = parse_level(&env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()));
    let format = LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()));
    let include_spans = env::var("LOG_SPANS")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    init_logging(level, format, include_spans);
}

/// Span around a single HDM terminal command
#[macro_export]
macro_rules! hdm_span {
    ($($field:tt)*) => {
        tracing::info_span!("hdm_command", $($field)*)
    };
}

/// Span around rendering and sending one receipt
#[macro_export]
macro_rules! print_span {
    ($($field:tt)*) => {
        tracing::info_span!("receipt_print", $($field)*)
    };
}

/// Span around a tab checkout
#[macro_export]
macro_rules! checkout_span {
    ($($field:tt)*) => {
        tracing::info_span!("checkout", $($field)*)
    };
}

/// Span around a bridge request
#[macro_export]
macro_rules! bridge_span {
    ($($field:tt)*) => {
        tracing::info_span!("bridge_request", $($field)*)
    };
}

pub use {bridge_span, checkout_span, hdm_span, print_span};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("CoMpAcT"), LogFormat::Compact);
    }

    #[test]
    fn test_log_format_parse_invalid_defaults_to_json() {
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Json);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
    }

    #[test]
    fn test_parse_level() {
        let cases = [
            ("ERROR", Level::ERROR),
            ("warn", Level::WARN),
            ("Info", Level::INFO),
            ("debug", Level::DEBUG),
            ("TRACE", Level::TRACE),
            ("verbose", Level::INFO),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_level(input), expected, "Failed for input: {input}");
        }
    }

    #[test]
    fn test_quiet_targets_are_valid_directives() {
        for target in QUIET_TARGETS {
            assert!(target.parse::<Directive>().is_ok(), "{target}");
        }
    }

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging(Level::INFO, LogFormat::Compact, false);
        init_logging(Level::DEBUG, LogFormat::Json, true);
        let span = hdm_span!(command = "login");
        let _guard = span.enter();
        tracing::info!("inside span");
    }
}

//! Observability for the POS terminal
//!
//! Structured logging and in-process metrics. Metrics are exposed by the
//! bridge on `/metrics` and `/health`.

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{bridge_span, checkout_span, hdm_span, print_span};

//! Terminal-level error type
//!
//! Wraps the subsystem errors and turns them into the plain strings the
//! desktop bridge reports back to the storefront.

use crate::config::ConfigError;
use crate::hdm::HdmError;
use crate::orders::OrderError;
use crate::thermal::ThermalError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const MAX_MESSAGE_LEN: usize = 500;
const TRUNCATE_SUFFIX: &str = "...[truncated]";

static SECRET_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(password|pin|key|token|secret)[=:]\s*\S+").ok());

static SENSITIVE_PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+").ok()
});

#[derive(Debug, Error)]
pub enum PosError {
    #[error("HDM error: {0}")]
    Hdm(#[from] HdmError),

    #[error("Printer error: {0}")]
    Thermal(#[from] ThermalError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PosError {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Errors the caller can fix by changing the request
    pub fn is_client_error(&self) -> bool {
        match self {
            PosError::InvalidInput { .. } | PosError::Order(_) => true,
            PosError::Thermal(e) => e.is_incomplete_draft(),
            _ => false,
        }
    }

    /// One-line message for the bridge `errors` list, with the source chain
    /// appended and secrets stripped
    pub fn to_bridge_error(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        // The top-level variants already print their direct source
        if matches!(
            self,
            PosError::Hdm(_) | PosError::Thermal(_) | PosError::Order(_) | PosError::Config(_)
        ) {
            source = source.and_then(std::error::Error::source);
        }
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        sanitize_error_message(&message)
    }
}

/// Strip secrets and sensitive paths, cap the length
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(pattern) = SECRET_PATTERN.as_ref() {
        sanitized = pattern.replace_all(&sanitized, "${1}=***").to_string();
    }
    if let Some(pattern) = SENSITIVE_PATH_PATTERN.as_ref() {
        sanitized = pattern
            .replace_all(&sanitized, "/***REDACTED***/")
            .to_string();
    }

    if sanitized.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN - TRUNCATE_SUFFIX.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(TRUNCATE_SUFFIX);
    }

    sanitized
}

pub type PosResult<T> = Result<T, PosError>;

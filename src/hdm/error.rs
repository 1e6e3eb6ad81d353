//! HDM client errors

use crate::protocol::{CipherError, FrameError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HdmError {
    #[error("Failed to connect to HDM at {endpoint}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("HDM connection error")]
    Io(#[from] io::Error),
    #[error("Timed out waiting for {expected} bytes from HDM")]
    Timeout { expected: usize },
    #[error("Timed out sending request to HDM")]
    WriteTimeout,
    #[error("HDM closed the connection")]
    ConnectionClosed,
    #[error("Not logged in to HDM, login() first")]
    NotLoggedIn,
    #[error("device error 0x{code:02x}: {message}")]
    Device { code: u8, message: String },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error("Invalid HDM JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No cashier credentials configured")]
    NoCredentials,
}

impl HdmError {
    /// Faults that leave the socket in an unknown state
    pub fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            HdmError::Connect { .. }
                | HdmError::Io(_)
                | HdmError::Timeout { .. }
                | HdmError::WriteTimeout
                | HdmError::ConnectionClosed
        )
    }

    /// Code reported by the terminal, if this is a device error
    pub fn device_code(&self) -> Option<u8> {
        match self {
            HdmError::Device { code, .. } => Some(*code),
            _ => None,
        }
    }
}

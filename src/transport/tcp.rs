//! TCP connector and device endpoint parsing

use super::Connector;
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

/// Raw-print port used by network receipt printers
pub const DEFAULT_PRINTER_PORT: u16 = 9100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Invalid device interface: {0}")]
    InvalidInterface(String),
    #[error("Unsupported interface scheme '{0}', expected tcp://")]
    UnsupportedScheme(String),
}

/// Opens `TcpStream`s with a bounded connect time
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
        }
    }

    /// Build a connector from an interface string such as `tcp://192.168.1.114`
    /// or `tcp://printer.local:9100`. A bare `host[:port]` is accepted too.
    pub fn from_interface(
        interface: &str,
        default_port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, EndpointError> {
        let (host, port) = parse_interface(interface, default_port)?;
        Ok(Self::new(host, port, connect_timeout))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Split an interface string into host and port
pub fn parse_interface(interface: &str, default_port: u16) -> Result<(String, u16), EndpointError> {
    let trimmed = interface.trim();
    if trimmed.is_empty() {
        return Err(EndpointError::InvalidInterface(interface.to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("tcp://{trimmed}")
    };

    let url =
        Url::parse(&candidate).map_err(|_| EndpointError::InvalidInterface(interface.to_string()))?;

    if url.scheme() != "tcp" {
        return Err(EndpointError::UnsupportedScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| EndpointError::InvalidInterface(interface.to_string()))?;

    Ok((host.to_string(), url.port().unwrap_or(default_port)))
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        debug!("Connecting to {}", self.endpoint());

        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!(
                    "connect to {} timed out after {:?}",
                    self.endpoint(),
                    self.connect_timeout
                ),
            )
        })??;

        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

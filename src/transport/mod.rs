//! Transport layer for device communication
//!
//! Both the HDM terminal and the receipt printer are reached over plain TCP.
//! The [`Connector`] trait hides how a byte stream is opened so the device
//! clients can be driven by in-memory streams in tests.

use tokio::io::{AsyncRead, AsyncWrite};

pub mod tcp;

pub use tcp::{EndpointError, TcpConnector};

/// Opens byte streams to a device
///
/// Implementations are cheap to call repeatedly: device clients open a fresh
/// stream whenever the previous one was dropped.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new stream to the device
    async fn connect(&self) -> std::io::Result<Self::Stream>;

    /// Human-readable endpoint for logs and errors
    fn endpoint(&self) -> String;
}

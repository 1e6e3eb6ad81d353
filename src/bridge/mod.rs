//! Desktop bridge
//!
//! A small local HTTP API the storefront calls for everything that needs
//! a device: fiscal receipts, thermal printing, and the order tabs that feed
//! them. Health and metrics are served alongside.

pub mod routes;

pub use routes::routes;

use crate::checkout::CheckoutService;
use crate::orders::OrderBook;
use crate::transport::{Connector, TcpConnector};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Everything a bridge request can touch
pub struct BridgeState<H: Connector = TcpConnector, P: Connector = TcpConnector> {
    pub terminal_id: String,
    /// Captured at startup so health never waits on a device call
    pub hdm_endpoint: String,
    pub checkout: Arc<CheckoutService<H, P>>,
    pub orders: Arc<Mutex<OrderBook>>,
}

impl<H: Connector, P: Connector> Clone for BridgeState<H, P> {
    fn clone(&self) -> Self {
        Self {
            terminal_id: self.terminal_id.clone(),
            hdm_endpoint: self.hdm_endpoint.clone(),
            checkout: Arc::clone(&self.checkout),
            orders: Arc::clone(&self.orders),
        }
    }
}

impl<H: Connector, P: Connector> BridgeState<H, P> {
    pub fn new(
        terminal_id: impl Into<String>,
        checkout: CheckoutService<H, P>,
        orders: OrderBook,
    ) -> Self {
        // nothing else holds the client before the bridge starts serving
        let hdm_endpoint = checkout
            .hdm()
            .try_lock()
            .map(|client| client.endpoint())
            .unwrap_or_default();
        Self {
            terminal_id: terminal_id.into(),
            hdm_endpoint,
            checkout: Arc::new(checkout),
            orders: Arc::new(Mutex::new(orders)),
        }
    }
}

pub struct BridgeServer<H: Connector = TcpConnector, P: Connector = TcpConnector> {
    state: BridgeState<H, P>,
    addr: SocketAddr,
}

impl<H: Connector + 'static, P: Connector + 'static> BridgeServer<H, P> {
    /// Bridge bound to localhost only
    pub fn new(state: BridgeState<H, P>, port: u16) -> Self {
        Self {
            state,
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
        }
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), warp::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (addr, server) =
            warp::serve(routes(self.state)).try_bind_with_graceful_shutdown(self.addr, shutdown)?;
        info!(%addr, "Desktop bridge listening");
        server.await;
        info!("Desktop bridge stopped");
        Ok(())
    }
}

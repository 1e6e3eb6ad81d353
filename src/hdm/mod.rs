//! HDM fiscal terminal client
//!
//! # Usage
//!
//! ```rust,no_run
//! use pos_terminal::hdm::{CashierCredentials, HdmClient};
//! use pos_terminal::transport::TcpConnector;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let connector = TcpConnector::new("192.168.0.222", 1025, Duration::from_secs(5));
//! let mut client = HdmClient::new(connector, std::env::var("HDM_PASSWORD")?);
//!
//! client.login(CashierCredentials::new(3, 3)).await?;
//! let time = client.get_date_time().await?;
//! println!("terminal time: {time}");
//! client.logout().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod error;

pub use client::{
    CashierCredentials, HdmClient, SharedHdmClient, DEFAULT_HDM_PORT, DEFAULT_RESPONSE_TIMEOUT,
};
pub use error::HdmError;

//! POS terminal backend
//!
//! Drives the two devices behind a cashier's storefront and keeps the open
//! orders that feed them:
//!
//! - [`hdm`]: client for the HDM fiscal terminal (3DES-encrypted JSON behind
//!   a binary header, over raw TCP)
//! - [`thermal`]: receipt layout, rasterization and ESC/POS printing
//! - [`orders`]: in-memory order tabs with totals
//! - [`checkout`]: turns an order into a fiscal receipt plus a printed one
//! - [`bridge`]: local HTTP API used by the storefront UI
//!
//! # Quick Start
//!
//! ```rust
//! use pos_terminal::orders::{NewItem, OrderBook};
//!
//! let mut book = OrderBook::new();
//! let tab = book
//!     .add_item(
//!         Some(0),
//!         NewItem {
//!             product_id: "latte".to_string(),
//!             name: "Latte".to_string(),
//!             description: Some("oat".to_string()),
//!             price: 1400.0,
//!         },
//!     )
//!     .unwrap();
//!
//! assert_eq!(book.totals(tab).unwrap().total, 1400.0);
//! ```

pub mod bridge;
pub mod checkout;
pub mod config;
pub mod error;
pub mod hdm;
pub mod observability;
pub mod orders;
pub mod protocol;
pub mod testing;
pub mod thermal;
pub mod transport;

pub use checkout::{CheckoutRequest, CheckoutService, Envelope, PaymentMethod, PaymentStatus};
pub use config::{ConfigError, PosConfig};
pub use error::{PosError, PosResult};
pub use hdm::{CashierCredentials, HdmClient, HdmError, SharedHdmClient};
pub use orders::{OrderBook, OrderError};
pub use thermal::{ReceiptDraft, ThermalError, ThermalPrinter};

//! Testing utilities and mock devices
//!
//! Lets the HDM client, printer, checkout and bridge be exercised without a
//! fiscal terminal or a thermal printer on the network.

pub mod fake_hdm;
pub mod mocks;

pub use fake_hdm::{FakeHdmBuilder, FakeHdmTerminal, RecordedRequest};
pub use mocks::*;

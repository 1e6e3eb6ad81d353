//! HDM fiscal terminal wire protocol
//!
//! Framing, body encryption and the JSON message shapes exchanged with the
//! tax-registration terminal.

pub mod cipher;
pub mod frame;
pub mod messages;

pub use cipher::{CipherError, SessionKey};
pub use frame::{FrameError, ResponseCode, ResponseHeader};
pub use messages::*;

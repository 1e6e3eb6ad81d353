//! Thermal receipt composition and printing
//!
//! `receipt` holds the data, `layout` places it, `raster` paints it,
//! `escpos` encodes it and `printer` ships it to the device.

pub mod error;
pub mod escpos;
pub mod layout;
pub mod localization;
pub mod printer;
pub mod raster;
pub mod receipt;

pub use error::ThermalError;
pub use layout::{compose, ReceiptLayout};
pub use localization::{Labels, Language};
pub use printer::{PrinterSettings, ThermalPrinter};
pub use raster::{to_monochrome, FontSet, MonoBitmap};
pub use receipt::{
    format_amount, BarcodeSource, BillingInfo, CashierInfo, CompanyInfo, CustomerInfo, LogoInfo,
    PaperWidth, Product, ReceiptDraft, ReceiptInfo,
};

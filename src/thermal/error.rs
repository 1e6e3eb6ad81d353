//! Receipt printing errors

use crate::transport::EndpointError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThermalError {
    #[error("Company info is not set")]
    CompanyNotSet,
    #[error("Cashier info is not set")]
    CashierNotSet,
    #[error("Customer info is not set")]
    CustomerNotSet,
    #[error("Receipt info is not set")]
    ReceiptNotSet,
    #[error("No products to print")]
    NoProducts,
    #[error("Unsupported paper width {0}mm, expected 58, 72 or 80")]
    UnsupportedPaperWidth(u32),
    #[error("Failed to read font {path}")]
    FontRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Not a usable TrueType font: {0}")]
    InvalidFont(String),
    #[error("Barcode encoding failed: {0}")]
    Barcode(String),
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("Printer at {endpoint} is unreachable")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("Printer connection error")]
    Io(#[from] io::Error),
}

impl ThermalError {
    /// Missing receipt data, as opposed to device or rendering trouble
    pub fn is_incomplete_draft(&self) -> bool {
        matches!(
            self,
            ThermalError::CompanyNotSet
                | ThermalError::CashierNotSet
                | ThermalError::CustomerNotSet
                | ThermalError::ReceiptNotSet
                | ThermalError::NoProducts
        )
    }
}

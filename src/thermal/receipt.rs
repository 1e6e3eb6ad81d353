//! Receipt data model
//!
//! A [`ReceiptDraft`] collects the sections of one receipt. Company and
//! cashier details normally stay put for a whole shift, so a successful print
//! only clears the per-order sections.

use super::ThermalError;
use serde::{Deserialize, Serialize};

/// Supported paper rolls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PaperWidth {
    Mm58,
    #[default]
    Mm72,
    Mm80,
}

impl PaperWidth {
    pub fn millimeters(self) -> u32 {
        match self {
            PaperWidth::Mm58 => 58,
            PaperWidth::Mm72 => 72,
            PaperWidth::Mm80 => 80,
        }
    }

    /// Printable width at 8 dots per millimeter
    pub fn dots(self) -> u32 {
        self.millimeters() * 8
    }
}

impl TryFrom<u32> for PaperWidth {
    type Error = ThermalError;

    fn try_from(mm: u32) -> Result<Self, Self::Error> {
        match mm {
            58 => Ok(PaperWidth::Mm58),
            72 => Ok(PaperWidth::Mm72),
            80 => Ok(PaperWidth::Mm80),
            other => Err(ThermalError::UnsupportedPaperWidth(other)),
        }
    }
}

impl From<PaperWidth> for u32 {
    fn from(width: PaperWidth) -> Self {
        width.millimeters()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogoInfo {
    #[serde(default)]
    pub show: bool,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub logo: LogoInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashierInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptInfo {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingInfo {
    #[serde(default)]
    pub discount: Option<f64>,
    #[serde(default)]
    pub delivery: Option<f64>,
    #[serde(default)]
    pub card_amount: Option<f64>,
    #[serde(default)]
    pub cash_amount: Option<f64>,
    #[serde(default)]
    pub sub_total: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub qty: f64,
    pub price: f64,
}

impl Product {
    pub fn amount(&self) -> f64 {
        self.qty * self.price
    }
}

/// What goes into the 2D code at the bottom of the receipt
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BarcodeSource {
    /// Derived from the print time and receipt number
    #[default]
    Generated,
    /// Explicit payload, e.g. the fiscal code returned by the HDM
    Payload(String),
    /// No code at all (pre-bills)
    Hidden,
}

#[derive(Debug, Clone, Default)]
pub struct ReceiptDraft {
    company: Option<CompanyInfo>,
    cashier: Option<CashierInfo>,
    customer: Option<CustomerInfo>,
    receipt: Option<ReceiptInfo>,
    billing: Option<BillingInfo>,
    products: Vec<Product>,
    barcode: BarcodeSource,
}

impl ReceiptDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_company(&mut self, info: CompanyInfo) -> &mut Self {
        self.company = Some(info);
        self
    }

    pub fn set_cashier(&mut self, info: CashierInfo) -> &mut Self {
        self.cashier = Some(info);
        self
    }

    pub fn set_customer(&mut self, info: CustomerInfo) -> &mut Self {
        self.customer = Some(info);
        self
    }

    pub fn set_receipt(&mut self, info: ReceiptInfo) -> &mut Self {
        self.receipt = Some(info);
        self
    }

    pub fn set_billing(&mut self, info: BillingInfo) -> &mut Self {
        self.billing = Some(info);
        self
    }

    pub fn set_barcode(&mut self, barcode: BarcodeSource) -> &mut Self {
        self.barcode = barcode;
        self
    }

    pub fn add_products<I: IntoIterator<Item = Product>>(&mut self, products: I) -> &mut Self {
        self.products.extend(products);
        self
    }

    pub fn company(&self) -> Option<&CompanyInfo> {
        self.company.as_ref()
    }

    pub fn cashier(&self) -> Option<&CashierInfo> {
        self.cashier.as_ref()
    }

    pub fn customer(&self) -> Option<&CustomerInfo> {
        self.customer.as_ref()
    }

    pub fn receipt(&self) -> Option<&ReceiptInfo> {
        self.receipt.as_ref()
    }

    pub fn billing(&self) -> Option<&BillingInfo> {
        self.billing.as_ref()
    }

    pub fn billing_mut(&mut self) -> Option<&mut BillingInfo> {
        self.billing.as_mut()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn barcode(&self) -> &BarcodeSource {
        &self.barcode
    }

    /// Check that everything a receipt needs has been set
    pub fn validate(&self) -> Result<(), ThermalError> {
        if self.company.is_none() {
            return Err(ThermalError::CompanyNotSet);
        }
        if self.cashier.is_none() {
            return Err(ThermalError::CashierNotSet);
        }
        if self.customer.is_none() {
            return Err(ThermalError::CustomerNotSet);
        }
        if self.receipt.is_none() {
            return Err(ThermalError::ReceiptNotSet);
        }
        if self.products.is_empty() {
            return Err(ThermalError::NoProducts);
        }
        Ok(())
    }

    /// Clear the per-order sections, keeping company and cashier
    pub fn finish_print(&mut self) {
        self.customer = None;
        self.receipt = None;
        self.billing = None;
        self.products.clear();
        self.barcode = BarcodeSource::Generated;
    }

    /// Clear everything
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Render an amount the way it appears on paper: no trailing `.0`, at most
/// two decimals.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let fixed = format!("{value:.2}");
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

//! Open order tabs
//!
//! Tabs live in memory for the lifetime of the terminal process. Each tab is
//! an ordered list of line items; adding the same product variant twice bumps
//! the quantity instead of adding a second line.

pub mod book;

pub use book::OrderBook;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type TabId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Order tab {0} not found")]
    TabNotFound(TabId),
    #[error("Product {product_id} is not on tab {tab}")]
    ItemNotFound { tab: TabId, product_id: String },
    #[error("Invalid tax rate {0}, expected a fraction between 0 and 1")]
    InvalidTaxRate(String),
}

/// One line on a tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub qty: u32,
    pub price: f64,
}

impl LineItem {
    pub fn amount(&self) -> f64 {
        self.qty as f64 * self.price
    }

    /// Same product, name and description: the line a repeat add merges into
    pub fn same_variant(&self, item: &NewItem) -> bool {
        self.product_id == item.product_id
            && self.name == item.name
            && self.description == item.description
    }
}

/// Product picked in the storefront, before it has a quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub items: Vec<LineItem>,
}

impl Tab {
    pub fn new(id: TabId) -> Self {
        Self {
            id,
            items: Vec::new(),
        }
    }

    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(LineItem::amount).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl Totals {
    pub fn compute(subtotal: f64, tax_rate: f64) -> Self {
        let tax = subtotal * tax_rate;
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

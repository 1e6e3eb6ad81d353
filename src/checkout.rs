//! Checkout: turn an order into a fiscal receipt and a printed one
//!
//! Paid orders are registered with the HDM first and only then printed, with
//! the fiscal code in the receipt barcode. Pending (card) orders get a
//! pre-bill. Every outcome is reported through an [`Envelope`]; failures end
//! up in its `errors` list instead of being returned.

use crate::checkout_span;
use crate::config::PosConfig;
use crate::error::PosError;
use crate::hdm::{CashierCredentials, HdmError, SharedHdmClient};
use crate::observability::metrics;
use crate::orders::{Tab, TabId};
use crate::protocol::messages::{ReceiptItem, ReceiptMode, ReceiptRequest, ReceiptResponse};
use crate::thermal::{
    BarcodeSource, BillingInfo, CashierInfo, CompanyInfo, CustomerInfo, Labels, Product,
    ReceiptDraft, ReceiptInfo, ThermalPrinter,
};
use crate::transport::{Connector, TcpConnector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Receipt date as printed, e.g. `18/10/2026, 14:05`
pub const RECEIPT_DATE_FORMAT: &str = "%d/%m/%Y, %H:%M";

/// Bridge response shape: the request echoed back, what came out, and
/// every error on the way
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub request: Value,
    pub result: Value,
    pub errors: Vec<String>,
}

impl Envelope {
    pub fn new(request: Value) -> Self {
        Self {
            request,
            result: Value::Null,
            errors: Vec::new(),
        }
    }

    pub fn push_error(&mut self, error: impl Into<PosError>) {
        self.errors.push(error.into().to_bridge_error());
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Cash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Paid,
    Pending,
}

/// One order line as the storefront sends it for printing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    #[serde(default)]
    pub product_code: Value,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub qty: f64,
    #[serde(default)]
    pub dep: Option<u32>,
    #[serde(default)]
    pub adg_code: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl CheckoutItem {
    /// Name as registered with the HDM: `name(description)`
    pub fn fiscal_name(&self) -> String {
        match self.description.as_deref() {
            Some(description) if !description.is_empty() => {
                format!("{}({})", self.name, description)
            }
            _ => self.name.clone(),
        }
    }

    fn product_code(&self, index: usize) -> String {
        match &self.product_code {
            Value::String(code) => code.clone(),
            Value::Number(code) => code.to_string(),
            _ => index.to_string(),
        }
    }
}

/// Order payload for a combined fiscal and thermal print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub id: Option<TabId>,
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub mode: ReceiptMode,
    #[serde(default)]
    pub paid_amount: f64,
    #[serde(default)]
    pub paid_amount_card: f64,
    #[serde(default)]
    pub status: PaymentStatus,
}

impl CheckoutRequest {
    /// Build the payload for a tab. Card payments are left pending until
    /// the terminal confirms them; cash is paid on the spot.
    pub fn from_tab(tab: &Tab, total: f64, method: PaymentMethod) -> Self {
        let items = tab
            .items
            .iter()
            .enumerate()
            .map(|(index, line)| CheckoutItem {
                product_code: Value::from(index),
                name: line.name.clone(),
                description: line.description.clone(),
                price: line.price,
                qty: f64::from(line.qty),
                dep: None,
                adg_code: None,
                unit: None,
            })
            .collect();

        let mut request = Self {
            id: Some(tab.id),
            items,
            mode: ReceiptMode::ItemsList,
            paid_amount: 0.0,
            paid_amount_card: 0.0,
            status: PaymentStatus::Paid,
        };
        match method {
            PaymentMethod::Card => {
                request.status = PaymentStatus::Pending;
                request.paid_amount_card = total;
            }
            PaymentMethod::Cash => request.paid_amount = total,
        }
        request
    }

    pub fn amount(&self) -> f64 {
        self.paid_amount + self.paid_amount_card
    }

    /// Card amount when there is one, cash otherwise
    pub fn charged_total(&self) -> f64 {
        if self.paid_amount_card != 0.0 {
            self.paid_amount_card
        } else {
            self.paid_amount
        }
    }
}

/// What a print request produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOutcome {
    /// Nothing to print: no items or a zero amount
    pub skipped: bool,
    pub pre_bill: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal: Option<ReceiptResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<usize>,
}

/// Values from the configuration that go onto every receipt
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSettings {
    pub cashiers: Vec<CashierCredentials>,
    pub department: u32,
    pub adg_code: String,
    pub unit: String,
    pub company: CompanyInfo,
    pub cashier: CashierInfo,
    pub customer: CustomerInfo,
}

impl From<&PosConfig> for CheckoutSettings {
    fn from(config: &PosConfig) -> Self {
        Self {
            cashiers: config.hdm.cashiers.clone(),
            department: config.hdm.department,
            adg_code: config.hdm.adg_code.clone(),
            unit: config.hdm.unit.clone(),
            company: config.company.clone(),
            cashier: config.cashier.clone(),
            customer: config.customer.clone(),
        }
    }
}

pub struct CheckoutService<H: Connector = TcpConnector, P: Connector = TcpConnector> {
    hdm: SharedHdmClient<H>,
    printer: Arc<ThermalPrinter<P>>,
    settings: CheckoutSettings,
}

impl<H: Connector, P: Connector> CheckoutService<H, P> {
    pub fn new(
        hdm: SharedHdmClient<H>,
        printer: Arc<ThermalPrinter<P>>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            hdm,
            printer,
            settings,
        }
    }

    pub fn hdm(&self) -> &SharedHdmClient<H> {
        &self.hdm
    }

    pub fn printer(&self) -> &Arc<ThermalPrinter<P>> {
        &self.printer
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Check out a tab with the given payment method
    pub async fn checkout(&self, tab: &Tab, total: f64, method: PaymentMethod) -> Envelope {
        let request = CheckoutRequest::from_tab(tab, total, method);
        self.print_receipt(request).await
    }

    /// Fiscal receipt for a checkout payload, items mapped to HDM lines
    pub fn fiscal_request(&self, request: &CheckoutRequest) -> ReceiptRequest {
        let items = request
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| ReceiptItem {
                product_code: item.product_code(index),
                product_name: item.fiscal_name(),
                price: item.price,
                qty: item.qty,
                dep: item.dep.unwrap_or(self.settings.department),
                discount: None,
                discount_type: None,
                additional_discount: None,
                adg_code: item
                    .adg_code
                    .clone()
                    .unwrap_or_else(|| self.settings.adg_code.clone()),
                unit: item
                    .unit
                    .clone()
                    .unwrap_or_else(|| self.settings.unit.clone()),
            })
            .collect();

        ReceiptRequest {
            items,
            mode: request.mode,
            paid_amount: request.paid_amount,
            paid_amount_card: request.paid_amount_card,
            ..Default::default()
        }
    }

    /// Operator list, login with the configured cashiers, register the receipt
    pub async fn register_fiscal(
        &self,
        request: &ReceiptRequest,
    ) -> Result<ReceiptResponse, HdmError> {
        let mut hdm = self.hdm.lock().await;

        let operators = hdm.get_operator_list().await?;
        debug!(operators = operators.operators.len(), "HDM operators listed");

        let cashier = hdm.login_with_fallback(&self.settings.cashiers).await?;
        debug!(cashier = cashier.cashier, "HDM login accepted");

        let response = hdm.print_receipt(request).await?;
        info!(
            rseq = ?response.rseq,
            items = request.items.len(),
            "Fiscal receipt registered"
        );
        Ok(response)
    }

    /// `POST /api/hdm`: register a fiscal receipt, an empty one by default
    pub async fn hdm_envelope(&self, request: Option<ReceiptRequest>) -> Envelope {
        let mut envelope = Envelope::new(
            request
                .as_ref()
                .and_then(|r| serde_json::to_value(r).ok())
                .unwrap_or(Value::Null),
        );
        let request = request.unwrap_or_default();

        match self.register_fiscal(&request).await {
            Ok(response) => {
                envelope.result = serde_json::to_value(&response).unwrap_or(Value::Null);
            }
            Err(e) => {
                warn!(error = %e, "Fiscal registration failed");
                envelope.push_error(e);
            }
        }
        envelope
    }

    /// `POST /api/print`: fiscal registration and receipt for paid orders,
    /// pre-bill for pending ones
    pub async fn print_receipt(&self, request: CheckoutRequest) -> Envelope {
        let span = checkout_span!(
            order = ?request.id,
            status = ?request.status,
            items = request.items.len()
        );
        self.run_checkout(request).instrument(span).await
    }

    async fn run_checkout(&self, request: CheckoutRequest) -> Envelope {
        let mut envelope = Envelope::new(serde_json::to_value(&request).unwrap_or(Value::Null));
        let mut outcome = PrintOutcome::default();

        if request.items.is_empty() || request.amount() == 0.0 {
            info!("Nothing to charge, checkout skipped");
            metrics().checkout_skipped();
            outcome.skipped = true;
            envelope.result = serde_json::to_value(&outcome).unwrap_or(Value::Null);
            return envelope;
        }

        metrics().checkout_started();
        let mut draft = self.draft_for(&request);

        match request.status {
            PaymentStatus::Paid => {
                match self.register_fiscal(&self.fiscal_request(&request)).await {
                    Ok(fiscal) => {
                        if let Some(code) = fiscal.qr.clone().or_else(|| fiscal.fiscal.clone()) {
                            draft.set_barcode(BarcodeSource::Payload(code));
                        }
                        outcome.fiscal = Some(fiscal);
                        match self.printer.print(&mut draft).await {
                            Ok(bytes) => outcome.bytes_sent = Some(bytes),
                            Err(e) => envelope.push_error(e),
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Fiscal registration failed, receipt not printed");
                        envelope.push_error(e);
                    }
                }
            }
            PaymentStatus::Pending => {
                outcome.pre_bill = true;
                match self.printer.pre_print(&mut draft).await {
                    Ok(bytes) => outcome.bytes_sent = Some(bytes),
                    Err(e) => envelope.push_error(e),
                }
            }
        }

        metrics().checkout_finished(envelope.is_ok());
        envelope.result = serde_json::to_value(&outcome).unwrap_or(Value::Null);
        envelope
    }

    /// Receipt data for one order
    pub fn draft_for(&self, request: &CheckoutRequest) -> ReceiptDraft {
        build_draft(&self.settings, self.printer.labels(), request)
    }
}

/// Fill a fresh draft from the configured sections and an order payload.
/// Billing shows the card amount as the total when there is one.
pub fn build_draft(
    settings: &CheckoutSettings,
    labels: &Labels,
    request: &CheckoutRequest,
) -> ReceiptDraft {
    let total = request.charged_total();
    let mut draft = ReceiptDraft::new();
    draft
        .set_company(settings.company.clone())
        .set_cashier(settings.cashier.clone())
        .set_customer(settings.customer.clone())
        .set_receipt(ReceiptInfo {
            date: Some(chrono::Local::now().format(RECEIPT_DATE_FORMAT).to_string()),
            number: request.id.map(|id| id.to_string()),
        })
        .set_billing(BillingInfo {
            discount: Some(0.0),
            delivery: Some(0.0),
            card_amount: Some(request.paid_amount_card),
            cash_amount: Some(request.paid_amount),
            sub_total: Some(total),
            total: Some(total),
            payment_status: Some(labels.status_paid.to_string()),
        })
        .add_products(request.items.iter().map(|item| Product {
            name: item.name.clone(),
            description: item.description.clone(),
            qty: item.qty,
            price: item.price,
        }));
    draft
}

//! HDM request and response bodies
//!
//! Bodies travel as camelCase JSON. Authenticated commands carry a top-level
//! `seq` merged into the command payload, see [`SessionEnvelope`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command function codes (header byte 8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    OperatorList = 0x01,
    Login = 0x02,
    Logout = 0x03,
    PrintReceipt = 0x04,
    PrintLastCopy = 0x05,
    PrintReturn = 0x06,
    SetHeaderFooter = 0x07,
    SetLogo = 0x08,
    PrintReport = 0x09,
    ReceiptInfo = 0x0a,
    CashInOut = 0x0b,
    DateTime = 0x0c,
    PrintTemplate = 0x0d,
    SyncDevice = 0x0e,
    PaySystems = 0x0f,
}

impl FunctionCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Operator list and login are encrypted with the password key; every
    /// other command needs the session key
    pub fn requires_session(self) -> bool {
        !matches!(self, FunctionCode::OperatorList | FunctionCode::Login)
    }

    pub fn name(self) -> &'static str {
        match self {
            FunctionCode::OperatorList => "operator_list",
            FunctionCode::Login => "login",
            FunctionCode::Logout => "logout",
            FunctionCode::PrintReceipt => "print_receipt",
            FunctionCode::PrintLastCopy => "print_last_copy",
            FunctionCode::PrintReturn => "print_return",
            FunctionCode::SetHeaderFooter => "set_header_footer",
            FunctionCode::SetLogo => "set_logo",
            FunctionCode::PrintReport => "print_report",
            FunctionCode::ReceiptInfo => "receipt_info",
            FunctionCode::CashInOut => "cash_in_out",
            FunctionCode::DateTime => "date_time",
            FunctionCode::PrintTemplate => "print_template",
            FunctionCode::SyncDevice => "sync_device",
            FunctionCode::PaySystems => "pay_systems",
        }
    }
}

/// Function 0x01 body
#[derive(Debug, Serialize)]
pub struct OperatorListRequest<'a> {
    pub password: &'a str,
}

/// Function 0x02 body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub password: &'a str,
    pub cashier: u32,
    pub pin: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub key: String,
}

/// Operator (cashier) registered on the terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub deps: Vec<u32>,
}

/// Function 0x01 response; extra fields are ignored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorList {
    #[serde(default, rename = "c")]
    pub operators: Vec<Operator>,
}

/// Authenticated request body: `{ "seq": n, ...payload }`
#[derive(Debug, Serialize)]
pub struct SessionEnvelope<'a, T: Serialize> {
    pub seq: u32,
    #[serde(flatten)]
    pub payload: &'a T,
}

/// Payload for commands that carry nothing besides `seq`
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmptyPayload {}

/// Receipt mode (`mode` field of a receipt request)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiptMode {
    /// Single department amount without item list
    Simple,
    /// Itemized receipt
    #[default]
    ItemsList,
    /// Advance payment
    Prepayment,
}

impl ReceiptMode {
    pub fn as_u8(self) -> u8 {
        match self {
            ReceiptMode::Simple => 1,
            ReceiptMode::ItemsList => 2,
            ReceiptMode::Prepayment => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ReceiptMode::Simple),
            2 => Some(ReceiptMode::ItemsList),
            3 => Some(ReceiptMode::Prepayment),
            _ => None,
        }
    }
}

impl Serialize for ReceiptMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ReceiptMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        ReceiptMode::from_u8(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown receipt mode {raw}")))
    }
}

/// Discount kinds accepted on receipt items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountType {
    Percent,
    Amount,
    ItemPercent,
    ItemAmount,
}

impl DiscountType {
    pub fn as_u8(self) -> u8 {
        match self {
            DiscountType::Percent => 1,
            DiscountType::Amount => 2,
            DiscountType::ItemPercent => 4,
            DiscountType::ItemAmount => 5,
        }
    }
}

impl Serialize for DiscountType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for DiscountType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(DiscountType::Percent),
            2 => Ok(DiscountType::Amount),
            4 => Ok(DiscountType::ItemPercent),
            5 => Ok(DiscountType::ItemAmount),
            other => Err(serde::de::Error::custom(format!(
                "unknown discount type {other}"
            ))),
        }
    }
}

/// One fiscal receipt line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    pub product_code: String,
    pub product_name: String,
    pub price: f64,
    pub qty: f64,
    pub dep: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<DiscountType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_discount: Option<f64>,
    pub adg_code: String,
    pub unit: String,
}

/// Function 0x04 payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRequest {
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
    #[serde(default)]
    pub mode: ReceiptMode,
    #[serde(default)]
    pub paid_amount: f64,
    #[serde(default)]
    pub paid_amount_card: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_payment_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_tin: Option<String>,
    #[serde(default, rename = "useExtPOS", skip_serializing_if = "Option::is_none")]
    pub use_ext_pos: Option<bool>,
}

impl ReceiptRequest {
    /// Sum of line amounts before any discount
    pub fn items_total(&self) -> f64 {
        self.items.iter().map(|item| item.price * item.qty).sum()
    }

    pub fn paid_total(&self) -> f64 {
        self.paid_amount + self.paid_amount_card
    }
}

/// Fiscal data the terminal returns for a registered receipt.
/// Every field is optional because firmware revisions differ.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptResponse {
    #[serde(default)]
    pub rseq: Option<u64>,
    #[serde(default)]
    pub crn: Option<String>,
    #[serde(default)]
    pub sn: Option<String>,
    #[serde(default)]
    pub tin: Option<String>,
    #[serde(default)]
    pub taxpayer: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub fiscal: Option<String>,
    #[serde(default)]
    pub lottery: Option<String>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub qr: Option<String>,
}

/// Item being returned from an earlier receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub rpid: u32,
    pub quantity: f64,
}

/// Function 0x06 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crn: Option<String>,
    pub receipt_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_item_list: Option<Vec<ReturnItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_amount_for_return: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_amount_for_return: Option<f64>,
}

/// Function 0x0b payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashInOutRequest {
    pub amount: f64,
    pub is_cash_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Report kinds for function 0x09
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    /// Interim shift report
    X,
    /// Shift-closing report
    Z,
}

impl Serialize for ReportType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            ReportType::X => 1,
            ReportType::Z => 2,
        })
    }
}

impl<'de> Deserialize<'de> for ReportType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(ReportType::X),
            2 => Ok(ReportType::Z),
            other => Err(serde::de::Error::custom(format!("unknown report type {other}"))),
        }
    }
}

/// Function 0x09 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub report_type: ReportType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dept_id: Option<u32>,
}

/// Function 0x0a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptInfoRequest {
    pub receipt_id: u64,
}

/// One header or footer line printed on fiscal receipts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderFooterLine {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u8>,
}

/// Function 0x07 payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderFooterRequest {
    #[serde(default)]
    pub headers: Vec<HeaderFooterLine>,
    #[serde(default)]
    pub footers: Vec<HeaderFooterLine>,
}

/// Function 0x08 payload, `logo` is a base64 encoded monochrome bitmap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoRequest {
    pub logo: String,
}

/// Function 0x0d payload. Template fields differ per template kind and are
/// passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    pub template_type: u32,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

/// Extract the human-readable `message` a terminal attaches to failures
pub fn device_message(body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("Unknown error")
        .to_string()
}

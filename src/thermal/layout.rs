//! Receipt composer
//!
//! Turns a [`ReceiptDraft`] into a list of drawing operations on a canvas of
//! fixed width. Composition is pure: text is positioned by anchor and
//! alignment, and measuring glyphs is left to the rasterizer.

use super::localization::{Labels, Language};
use super::receipt::{format_amount, BarcodeSource, PaperWidth, ReceiptDraft};
use super::ThermalError;
use qrcode::{Color, QrCode};

pub const MARGIN: f32 = 10.0;
pub const LINE_HEIGHT: f32 = 28.0;
pub const HEADER_LINE_HEIGHT: f32 = 32.0;
/// Name line, description line and the separator gap
pub const PRODUCT_BLOCK_HEIGHT: f32 = LINE_HEIGHT * 2.0 + 15.0;
pub const HEADER_BLOCK_HEIGHT: f32 = 6.0 * HEADER_LINE_HEIGHT + 50.0;
/// Room reserved for the brand box, billing rows and the barcode
pub const FOOTER_ALLOWANCE: f32 = 950.0;

const BRAND_BOX_HEIGHT: f32 = 120.0;
const BRAND_BOX_INSET: f32 = 6.0;
const BRAND_FONT_SIZE: f32 = 68.0;
const BASE_FONT_SIZE: f32 = 24.0;
const BILLING_VALUE_PADDING: f32 = 20.0;
const BARCODE_SCALE: u32 = 3;
const DEFAULT_BRAND_NAME: &str = "BRAND NAME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

/// Vertical anchor of a text run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    Alphabetic,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    Black,
    White,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOp {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub bold: bool,
    pub align: Align,
    pub baseline: Baseline,
    pub ink: Ink,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text(TextOp),
    /// Horizontal rule, optionally dashed as (dash, gap)
    HLine {
        x1: f32,
        x2: f32,
        y: f32,
        dash: Option<(f32, f32)>,
    },
    StrokeRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
    FillRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        ink: Ink,
    },
    /// Square module matrix (dark = true), drawn at integer scale.
    ///
    /// The receipt code is always a QR symbol. Fiscal receipts printed by the
    /// terminal itself use PDF417, so scanners reading both must accept QR.
    Matrix {
        x: f32,
        y: f32,
        scale: u32,
        size: usize,
        modules: Vec<bool>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLayout {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

impl ReceiptLayout {
    pub fn texts(&self) -> impl Iterator<Item = &TextOp> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text(t) => Some(t),
            _ => None,
        })
    }
}

/// Canvas height for a given number of products
pub fn canvas_height(products: usize) -> u32 {
    (HEADER_BLOCK_HEIGHT + products as f32 * PRODUCT_BLOCK_HEIGHT + FOOTER_ALLOWANCE) as u32
}

/// Payload used when no explicit barcode was supplied
pub fn default_barcode_payload(unix_seconds: i64, receipt_number: Option<&str>) -> String {
    let number = receipt_number.filter(|n| !n.is_empty()).unwrap_or("0000");
    format!("Y-{unix_seconds}-0001-001-00{number}")
}

/// Lay out a validated draft
pub fn compose(
    draft: &ReceiptDraft,
    paper: PaperWidth,
    language: Language,
    unix_seconds: i64,
) -> Result<ReceiptLayout, ThermalError> {
    draft.validate()?;

    let mut composer = Composer {
        width: paper.dots() as f32,
        x: MARGIN,
        y: MARGIN,
        labels: language.labels(),
        ops: Vec::new(),
    };

    composer.space(3);
    let brand = draft
        .company()
        .and_then(|c| c.brand_name.as_deref())
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_BRAND_NAME);
    composer.brand_title(brand);
    composer.header(draft);
    composer.space(1);
    composer.products(draft);
    composer.billing(draft);

    let payload = match draft.barcode() {
        BarcodeSource::Generated => Some(default_barcode_payload(
            unix_seconds,
            draft.receipt().and_then(|r| r.number.as_deref()),
        )),
        BarcodeSource::Payload(p) => Some(p.clone()),
        BarcodeSource::Hidden => None,
    };
    if let Some(payload) = payload {
        composer.barcode(&payload)?;
    }

    Ok(ReceiptLayout {
        width: paper.dots(),
        height: canvas_height(draft.products().len()),
        ops: composer.ops,
    })
}

struct Composer {
    width: f32,
    x: f32,
    y: f32,
    labels: &'static Labels,
    ops: Vec<DrawOp>,
}

impl Composer {
    fn space(&mut self, lines: u32) {
        self.y += lines as f32 * LINE_HEIGHT;
    }

    fn text(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, bold: bool, align: Align) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.ops.push(DrawOp::Text(TextOp {
            text,
            x,
            y,
            size,
            bold,
            align,
            baseline: Baseline::Alphabetic,
            ink: Ink::Black,
        }));
    }

    fn brand_title(&mut self, brand: &str) {
        let inner_x = MARGIN + BRAND_BOX_INSET;
        self.ops.push(DrawOp::StrokeRect {
            x: MARGIN,
            y: self.y,
            w: self.width - MARGIN * 2.0,
            h: BRAND_BOX_HEIGHT,
        });
        self.ops.push(DrawOp::FillRect {
            x: inner_x,
            y: self.y + BRAND_BOX_INSET,
            w: self.width - inner_x * 2.0,
            h: BRAND_BOX_HEIGHT - BRAND_BOX_INSET * 2.0,
            ink: Ink::Black,
        });
        self.ops.push(DrawOp::Text(TextOp {
            text: brand.to_string(),
            x: self.width / 2.0,
            y: self.y + BRAND_BOX_HEIGHT / 2.0,
            size: BRAND_FONT_SIZE,
            bold: true,
            align: Align::Center,
            baseline: Baseline::Middle,
            ink: Ink::White,
        }));
        self.y += BRAND_BOX_HEIGHT + LINE_HEIGHT;
    }

    /// Label on the left, value flush right
    fn row(&mut self, label: &str, value: Option<&str>) {
        let (x, y) = (self.x, self.y);
        self.text(label, x, y, BASE_FONT_SIZE, false, Align::Left);
        if let Some(value) = value {
            self.text(value, self.width - MARGIN * 2.0, y, BASE_FONT_SIZE, false, Align::Right);
        }
        self.space(1);
    }

    fn header(&mut self, draft: &ReceiptDraft) {
        let labels = self.labels;
        let company = draft.company().cloned().unwrap_or_default();
        let receipt = draft.receipt().cloned().unwrap_or_default();
        let cashier = draft.cashier().cloned().unwrap_or_default();
        let customer = draft.customer().cloned().unwrap_or_default();

        self.space(2);
        self.row(labels.tax_id, company.tax_id.as_deref());
        self.row(labels.company_name, company.name.as_deref());
        self.row(labels.address, company.address.as_deref());
        self.row(labels.phone, company.phone.as_deref());
        self.space(1);
        self.row(labels.receipt_number, receipt.number.as_deref());
        self.row(labels.receipt_date, receipt.date.as_deref());
        self.space(1);
        self.row(labels.cashier_name, cashier.name.as_deref());
        self.row(labels.customer_name, customer.name.as_deref());
    }

    fn divider(&mut self, title: &str) {
        let line_y = self.y + LINE_HEIGHT;
        self.ops.push(DrawOp::HLine {
            x1: MARGIN,
            x2: self.width - MARGIN,
            y: line_y,
            dash: None,
        });
        self.text(title, MARGIN, line_y - 8.0, BASE_FONT_SIZE, true, Align::Left);
        self.y = line_y + 10.0;
    }

    fn products(&mut self, draft: &ReceiptDraft) {
        let products = draft.products();
        self.space(1);
        self.divider(&format!("{} ({})", self.labels.products, products.len()));

        let right = self.width - MARGIN;
        for (index, product) in products.iter().enumerate() {
            let line_y = self.y + LINE_HEIGHT;
            self.text(
                format!("{}. {}", index + 1, product.name),
                MARGIN,
                line_y,
                22.0,
                true,
                Align::Left,
            );
            self.text(
                format!("{} x {}", format_amount(product.qty), format_amount(product.price)),
                right,
                line_y,
                22.0,
                true,
                Align::Right,
            );
            self.y += LINE_HEIGHT;

            let line_y = self.y + LINE_HEIGHT;
            if let Some(description) = &product.description {
                self.text(description.clone(), MARGIN + 30.0, line_y, 20.0, false, Align::Left);
            }
            self.text(format_amount(product.amount()), right, line_y, 24.0, true, Align::Right);
            self.y += LINE_HEIGHT + 5.0;

            self.ops.push(DrawOp::HLine {
                x1: MARGIN,
                x2: right,
                y: self.y,
                dash: Some((4.0, 4.0)),
            });
            self.y += 10.0;
        }
    }

    fn billing(&mut self, draft: &ReceiptDraft) {
        self.space(2);
        let labels = self.labels;
        let billing = draft.billing().cloned().unwrap_or_default();

        // (label, value, bold, font size)
        let mut rows: Vec<(&str, String, bool, f32)> = Vec::new();
        let amounts = [
            (labels.sub_total, billing.sub_total),
            (labels.discount, billing.discount),
            (labels.delivery, billing.delivery),
            (labels.card_amount, billing.card_amount),
            (labels.cash_amount, billing.cash_amount),
        ];
        for (label, value) in amounts {
            if let Some(value) = value {
                rows.push((label, format_amount(value), false, 22.0));
            }
        }
        if let Some(total) = billing.total {
            rows.push((labels.total, format_amount(total), true, 30.0));
        }
        if let Some(status) = billing.payment_status {
            rows.push((labels.payment_status, status, true, 20.0));
        }

        let label_x = self.width / 2.0 + 150.0;
        let value_x = self.width - BILLING_VALUE_PADDING;
        let emphasized = rows.len().checked_sub(2);

        for (i, (label, value, bold, size)) in rows.into_iter().enumerate() {
            if Some(i) == emphasized {
                self.space(1);
            }
            let y = self.y;
            self.text(label, label_x, y, size, bold, Align::Right);
            self.text(value, value_x, y, size, bold, Align::Right);
            self.y += size + 4.0;
            if Some(i) == emphasized {
                self.space(1);
            }
        }

        self.space(3);
    }

    fn barcode(&mut self, payload: &str) -> Result<(), ThermalError> {
        let code = QrCode::new(payload.as_bytes()).map_err(|e| ThermalError::Barcode(e.to_string()))?;
        let size = code.width();
        let modules: Vec<bool> = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();

        let available = (self.width - MARGIN * 2.0).max(1.0) as u32;
        let scale = BARCODE_SCALE.min((available / size as u32).max(1));
        let side = (size as u32 * scale) as f32;

        self.ops.push(DrawOp::Matrix {
            x: ((self.width - side) / 2.0).floor(),
            y: self.y,
            scale,
            size,
            modules,
        });
        self.y += side + 5.0;

        let caption_y = self.y + 16.0;
        let center = self.width / 2.0;
        self.text(payload, center, caption_y, 20.0, false, Align::Center);
        self.y += 30.0;
        Ok(())
    }
}

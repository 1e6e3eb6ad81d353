//! Mock devices and fixtures
//!
//! An in-memory printer connector that captures every job, the HDM response
//! encoder used to script device replies, and font discovery for rendering
//! tests.

use crate::protocol::frame::RESPONSE_HEADER_LEN;
use crate::protocol::SessionKey;
use crate::thermal::{
    BillingInfo, CashierInfo, CompanyInfo, CustomerInfo, FontSet, Product, ReceiptDraft,
    ReceiptInfo,
};
use crate::transport::Connector;
use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Environment variable pointing at a TrueType font for rendering tests
pub const TEST_FONT_ENV: &str = "POS_TEST_FONT";

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
];

/// Encode a scripted HDM reply: 11-byte header plus the encrypted JSON body
pub fn encode_response(code: u8, body: &Value, key: &SessionKey) -> Vec<u8> {
    let plain = serde_json::to_vec(body).unwrap_or_default();
    let encrypted = key.encrypt(&plain);
    let len = encrypted.len().min(u16::MAX as usize) as u16;

    let mut frame = vec![0u8; RESPONSE_HEADER_LEN];
    frame[2] = code;
    frame[7..9].copy_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&encrypted);
    frame
}

/// First usable font: `POS_TEST_FONT`, then common system locations
pub fn find_test_font() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(TEST_FONT_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
    }
    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Fonts for rendering tests, `None` when the machine has none
pub fn load_test_fonts() -> Option<Arc<FontSet>> {
    let path = find_test_font()?;
    FontSet::load(&path, None).ok().map(Arc::new)
}

/// A complete receipt with two products
pub fn sample_draft() -> ReceiptDraft {
    let mut draft = ReceiptDraft::new();
    draft
        .set_company(CompanyInfo {
            tax_id: Some("08290572".to_string()),
            address: Some("Միասնիկյան 32/2, Դիլիջան".to_string()),
            phone: Some("+374 44 621112".to_string()),
            name: Some("Մեգի ՍՊԸ".to_string()),
            brand_name: Some("Piccola".to_string()),
            ..Default::default()
        })
        .set_cashier(CashierInfo {
            name: Some("Անահիտ Ա.".to_string()),
            id: Some("1234".to_string()),
        })
        .set_customer(CustomerInfo {
            name: Some("Անուն Ազգանուն".to_string()),
            id: Some("5678".to_string()),
        })
        .set_receipt(ReceiptInfo {
            date: Some("18/10/2026, 14:05".to_string()),
            number: Some("17".to_string()),
        })
        .set_billing(BillingInfo {
            discount: Some(0.0),
            delivery: Some(0.0),
            card_amount: Some(0.0),
            cash_amount: Some(2600.0),
            sub_total: Some(2600.0),
            total: Some(2600.0),
            payment_status: Some("Վճարված".to_string()),
        })
        .add_products(sample_products());
    draft
}

pub fn sample_products() -> Vec<Product> {
    vec![
        Product {
            name: "Թխվածքաբլիթ".to_string(),
            description: Some("կարագով".to_string()),
            qty: 2.0,
            price: 600.0,
        },
        Product {
            name: "Latte".to_string(),
            description: None,
            qty: 1.0,
            price: 1400.0,
        },
    ]
}

/// Printer connector that keeps every job in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    jobs: Arc<Mutex<Vec<Vec<u8>>>>,
    readers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    connects: Arc<AtomicUsize>,
    refuse: bool,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A printer that is switched off
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Default::default()
        }
    }

    /// Completed jobs, waiting for any still being written
    pub async fn jobs(&self) -> Vec<Vec<u8>> {
        let readers: Vec<_> = self.readers.lock().await.drain(..).collect();
        for reader in readers {
            let _ = reader.await;
        }
        self.jobs.lock().await.clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    type Stream = DuplexStream;

    async fn connect(&self) -> io::Result<DuplexStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }

        let (client, mut device) = tokio::io::duplex(64 * 1024);
        let jobs = Arc::clone(&self.jobs);
        let reader = tokio::spawn(async move {
            let mut job = Vec::new();
            if device.read_to_end(&mut job).await.is_ok() {
                jobs.lock().await.push(job);
            }
        });
        self.readers.lock().await.push(reader);
        Ok(client)
    }

    fn endpoint(&self) -> String {
        "memory://printer".to_string()
    }
}

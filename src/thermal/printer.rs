//! Network receipt printer
//!
//! Each job goes out on a fresh connection: render, threshold, encode as
//! ESC/POS, write everything, close.

use super::escpos::encode_receipt;
use super::layout::compose;
use super::localization::{Labels, Language};
use super::raster::{encode_png, render, to_monochrome, FontSet};
use super::receipt::{BarcodeSource, BillingInfo, PaperWidth, ReceiptDraft};
use super::ThermalError;
use crate::config::PrinterSection;
use crate::observability::metrics;
use crate::print_span;
use crate::transport::tcp::DEFAULT_PRINTER_PORT;
use crate::transport::{Connector, TcpConnector};
use image::GrayImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, Instrument};

/// Rendering options that do not change between receipts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterSettings {
    pub paper: PaperWidth,
    pub language: Language,
    /// Gray levels below this become black dots
    pub threshold: u8,
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            paper: PaperWidth::Mm72,
            language: Language::Hy,
            threshold: 128,
        }
    }
}

impl From<&PrinterSection> for PrinterSettings {
    fn from(config: &PrinterSection) -> Self {
        Self {
            paper: config.paper_width,
            language: config.language,
            threshold: config.threshold,
        }
    }
}

pub struct ThermalPrinter<C: Connector = TcpConnector> {
    connector: C,
    fonts: Arc<FontSet>,
    settings: PrinterSettings,
}

impl ThermalPrinter<TcpConnector> {
    /// Connect by `tcp://host[:port]` interface and load the configured fonts
    pub fn from_config(config: &PrinterSection) -> Result<Self, ThermalError> {
        let connector = TcpConnector::from_interface(
            &config.interface,
            DEFAULT_PRINTER_PORT,
            Duration::from_secs(config.connect_timeout_secs),
        )?;
        let fonts = FontSet::load(&config.font_path, config.bold_font_path.as_deref())?;
        Ok(Self::new(connector, Arc::new(fonts), PrinterSettings::from(config)))
    }
}

impl<C: Connector> ThermalPrinter<C> {
    pub fn new(connector: C, fonts: Arc<FontSet>, settings: PrinterSettings) -> Self {
        Self {
            connector,
            fonts,
            settings,
        }
    }

    pub fn settings(&self) -> PrinterSettings {
        self.settings
    }

    pub fn labels(&self) -> &'static Labels {
        self.settings.language.labels()
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    /// Lay out and paint a draft without touching the network
    pub fn render(&self, draft: &ReceiptDraft) -> Result<GrayImage, ThermalError> {
        let layout = compose(
            draft,
            self.settings.paper,
            self.settings.language,
            chrono::Utc::now().timestamp(),
        )?;
        Ok(render(&layout, &self.fonts))
    }

    pub fn render_png(&self, draft: &ReceiptDraft) -> Result<Vec<u8>, ThermalError> {
        encode_png(&self.render(draft)?)
    }

    /// Print a receipt, then clear the per-order sections of the draft.
    /// Returns the number of bytes sent.
    pub async fn print(&self, draft: &mut ReceiptDraft) -> Result<usize, ThermalError> {
        let sent = self
            .print_job(draft)
            .instrument(print_span!(kind = "receipt", endpoint = %self.endpoint()))
            .await?;
        draft.finish_print();
        Ok(sent)
    }

    /// Copy of `draft` as a pre-bill: pending status, no fiscal code
    pub fn pre_bill(&self, draft: &ReceiptDraft) -> ReceiptDraft {
        let mut bill = draft.clone();
        let pending = self.labels().status_pending.to_string();
        match bill.billing_mut() {
            Some(billing) => billing.payment_status = Some(pending),
            None => {
                bill.set_billing(BillingInfo {
                    payment_status: Some(pending),
                    ..Default::default()
                });
            }
        }
        bill.set_barcode(BarcodeSource::Hidden);
        bill
    }

    /// Print a pre-bill and reset the draft like a regular print
    pub async fn pre_print(&self, draft: &mut ReceiptDraft) -> Result<usize, ThermalError> {
        let bill = self.pre_bill(draft);
        let sent = self
            .print_job(&bill)
            .instrument(print_span!(kind = "pre_bill", endpoint = %self.endpoint()))
            .await?;
        metrics().pre_bill_printed();
        draft.finish_print();
        Ok(sent)
    }

    async fn print_job(&self, draft: &ReceiptDraft) -> Result<usize, ThermalError> {
        let result = async {
            let image = self.render(draft)?;
            let bitmap = to_monochrome(&image, self.settings.threshold);
            let job = encode_receipt(&bitmap);
            debug!(
                width = bitmap.width(),
                height = bitmap.height(),
                bytes = job.len(),
                "Encoded receipt"
            );
            self.send(&job).await?;
            Ok::<_, ThermalError>(job.len())
        }
        .await;

        match &result {
            Ok(bytes) => {
                metrics().print_job_sent(*bytes);
                info!(bytes, "Receipt printed");
            }
            Err(e) => {
                metrics().print_job_failed();
                error!(error = %e, "Receipt printing failed");
            }
        }
        result
    }

    async fn send(&self, job: &[u8]) -> Result<(), ThermalError> {
        let mut stream = self
            .connector
            .connect()
            .await
            .map_err(|source| ThermalError::Connect {
                endpoint: self.connector.endpoint(),
                source,
            })?;
        stream.write_all(job).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

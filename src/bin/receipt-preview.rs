//! Receipt preview
//!
//! Renders an order payload to PNG with the configured fonts and receipt
//! sections, exactly as the printer would get it, without touching any
//! device.

use clap::Parser;
use pos_terminal::checkout::{build_draft, CheckoutRequest, CheckoutSettings, PaymentStatus};
use pos_terminal::observability::init_default_logging;
use pos_terminal::thermal::{Language, PaperWidth, PrinterSettings, ThermalPrinter};
use pos_terminal::PosConfig;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "receipt-preview")]
#[command(about = "Render an order to a receipt PNG without printing")]
#[command(version)]
struct Args {
    /// Terminal configuration (fonts, company and cashier sections)
    #[arg(short, long, default_value = "pos.toml")]
    config: PathBuf,

    /// Order payload in the POST /api/print shape
    #[arg(long)]
    order: PathBuf,

    /// Output PNG
    #[arg(long, default_value = "receipt.png")]
    out: PathBuf,

    /// Render as a pre-bill regardless of the order status
    #[arg(long)]
    pre_bill: bool,

    /// Paper width in millimeters (58, 72 or 80)
    #[arg(long)]
    paper: Option<u32>,

    /// Receipt language (hy, en, ru)
    #[arg(long)]
    language: Option<Language>,
}

#[tokio::main]
async fn main() {
    init_default_logging();
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("Preview failed: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = PosConfig::load_from_file(&args.config)?;
    if let Some(paper) = args.paper {
        config.printer.paper_width = PaperWidth::try_from(paper)?;
    }
    if let Some(language) = args.language {
        config.printer.language = language;
    }

    let request: CheckoutRequest = serde_json::from_str(&std::fs::read_to_string(&args.order)?)?;
    let printer = ThermalPrinter::from_config(&config.printer)?;
    let settings = PrinterSettings::from(&config.printer);
    info!(
        paper = settings.paper.millimeters(),
        language = %settings.language,
        items = request.items.len(),
        "Rendering receipt preview"
    );

    let mut draft = build_draft(&CheckoutSettings::from(&config), printer.labels(), &request);
    if args.pre_bill || request.status == PaymentStatus::Pending {
        draft = printer.pre_bill(&draft);
    }

    std::fs::write(&args.out, printer.render_png(&draft)?)?;
    println!("{}", args.out.display());
    Ok(())
}

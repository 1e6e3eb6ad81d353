//! POS terminal - main entry point
//!
//! Runs the desktop bridge in front of the HDM fiscal terminal and the
//! receipt printer, plus a few maintenance commands.

use clap::{Parser, Subcommand};
use pos_terminal::checkout::{build_draft, CheckoutItem, CheckoutSettings};
use pos_terminal::observability::{init_default_logging, metrics};
use pos_terminal::{
    bridge::{BridgeServer, BridgeState},
    CheckoutRequest, CheckoutService, HdmClient, OrderBook, PaymentStatus, PosConfig,
    ThermalPrinter,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Point-of-sale terminal backend
#[derive(Parser)]
#[command(name = "pos-terminal")]
#[command(about = "HDM fiscal terminal client, receipt printer and order bridge")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the desktop bridge until interrupted
    Run,
    /// Validate the configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
    /// Talk to the HDM terminal directly
    Hdm {
        #[command(subcommand)]
        command: HdmCommand,
    },
    /// Render a receipt to PNG without printing
    Preview {
        /// Output file
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Order payload (JSON, same shape as POST /api/print)
        #[arg(long, value_name = "FILE")]
        order: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum HdmCommand {
    /// List the operators registered on the terminal
    Operators,
    /// Log in with the configured cashiers, then log out
    Login,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting pos-terminal v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_terminal(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Hdm { command } => handle_hdm_command(&config, command).await,
        Commands::Preview { out, order } => handle_preview(&config, &out, order.as_deref()),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> CliResult<PosConfig> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(PosConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["pos.toml", "config/pos.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(PosConfig::load_from_file(&path)?);
                }
            }

            Err("No configuration file found. Provide one with -c/--config or create pos.toml".into())
        }
    }
}

async fn run_terminal(config: PosConfig) -> CliResult<()> {
    info!("Terminal {} starting", config.terminal.id);
    let collector = metrics();
    collector.set_terminal_state("initializing");

    let password = config.get_hdm_password()?;
    let client = HdmClient::from_config(&config.hdm, password);
    let hdm_endpoint = client.endpoint();
    let hdm = Arc::new(Mutex::new(client));
    let printer = Arc::new(ThermalPrinter::from_config(&config.printer)?);
    info!(
        hdm = %hdm_endpoint,
        printer = %printer.endpoint(),
        "Devices configured"
    );

    let checkout = CheckoutService::new(
        Arc::clone(&hdm),
        printer,
        CheckoutSettings::from(&config),
    );
    let orders = OrderBook::with_tax_rate(config.terminal.tax_rate)?;
    let state = BridgeState::new(config.terminal.id.clone(), checkout, orders);

    collector.set_terminal_state("running");
    BridgeServer::new(state, config.bridge.port)
        .run_until(shutdown_signal())
        .await?;

    collector.set_terminal_state("stopping");
    hdm.lock().await.close().await;
    collector.set_terminal_state("stopped");
    info!("Terminal shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => info!("Received SIGINT, shutting down gracefully..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

fn handle_config_command(config: &PosConfig, show: bool) -> CliResult<()> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }
    if config.get_hdm_password().is_err() {
        warn!(
            "HDM password variable {} is not set in this environment",
            config.hdm.password_env
        );
    }

    info!("Configuration validation complete");
    Ok(())
}

async fn handle_hdm_command(config: &PosConfig, command: HdmCommand) -> CliResult<()> {
    let mut client = HdmClient::from_config(&config.hdm, config.get_hdm_password()?);

    let result = match command {
        HdmCommand::Operators => client.get_operator_list().await.map(|operators| {
            for operator in operators.operators {
                println!("{:>4}  {}  deps={:?}", operator.id, operator.name, operator.deps);
            }
        }),
        HdmCommand::Login => async {
            let cashier = client.login_with_fallback(&config.hdm.cashiers).await?;
            println!("Logged in as cashier {}", cashier.cashier);
            client.logout().await.map(|_| ())
        }
        .await,
    };

    client.close().await;
    Ok(result?)
}

fn handle_preview(config: &PosConfig, out: &Path, order: Option<&Path>) -> CliResult<()> {
    let request = match order {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => demo_order(),
    };

    let printer = ThermalPrinter::from_config(&config.printer)?;
    let settings = CheckoutSettings::from(config);
    let mut draft = build_draft(&settings, printer.labels(), &request);
    if request.status == PaymentStatus::Pending {
        draft = printer.pre_bill(&draft);
    }

    std::fs::write(out, printer.render_png(&draft)?)?;
    println!("Receipt preview written to {}", out.display());
    Ok(())
}

fn demo_order() -> CheckoutRequest {
    let item = |name: &str, description: Option<&str>, price: f64, qty: f64| CheckoutItem {
        product_code: Value::Null,
        name: name.to_string(),
        description: description.map(str::to_string),
        price,
        qty,
        dep: None,
        adg_code: None,
        unit: None,
    };

    CheckoutRequest {
        id: Some(1),
        items: vec![
            item("Espresso", None, 900.0, 2.0),
            item("Latte", Some("oat"), 1400.0, 1.0),
        ],
        mode: Default::default(),
        paid_amount: 3200.0,
        paid_amount_card: 0.0,
        status: PaymentStatus::Paid,
    }
}

//! HDM probe
//!
//! Checks that a fiscal terminal is reachable and that the password and
//! cashier credentials work: operator list, login, device time, logout.

use clap::Parser;
use pos_terminal::hdm::{CashierCredentials, HdmClient, DEFAULT_HDM_PORT};
use pos_terminal::observability::init_default_logging;
use pos_terminal::transport::TcpConnector;
use std::process;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "hdm-probe")]
#[command(about = "Check connectivity and credentials of an HDM fiscal terminal")]
#[command(version)]
struct Args {
    /// Terminal address
    #[arg(long)]
    host: String,

    /// Terminal port
    #[arg(long, default_value_t = DEFAULT_HDM_PORT)]
    port: u16,

    /// Environment variable holding the device password
    #[arg(long, default_value = "HDM_PASSWORD")]
    password_env: String,

    /// Cashier number
    #[arg(long, default_value_t = 3)]
    cashier: u32,

    /// Cashier PIN
    #[arg(long, default_value_t = 3)]
    pin: u32,

    /// Seconds to wait for each response
    #[arg(long, default_value_t = 15)]
    timeout: u64,
}

#[tokio::main]
async fn main() {
    init_default_logging();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Probe failed: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let password = std::env::var(&args.password_env)
        .map_err(|_| format!("Environment variable {} is not set", args.password_env))?;

    let connector = TcpConnector::new(args.host, args.port, Duration::from_secs(5));
    let mut client = HdmClient::new(connector, password)
        .with_response_timeout(Duration::from_secs(args.timeout));
    info!(endpoint = %client.endpoint(), "Probing HDM");

    let result = async {
        let operators = client.get_operator_list().await?;
        println!("operators: {}", operators.operators.len());
        for operator in &operators.operators {
            println!("  {:>4}  {}", operator.id, operator.name);
        }

        client
            .login(CashierCredentials::new(args.cashier, args.pin))
            .await?;
        println!("login: ok (cashier {})", args.cashier);

        let time = client.get_date_time().await?;
        println!("device time: {time}");

        client.logout().await?;
        println!("logout: ok");
        Ok::<_, pos_terminal::HdmError>(())
    }
    .await;

    client.close().await;
    Ok(result?)
}

//! # Banking-ledger
//! Http server for account registration, login, deposits, withdraws, transfers and history.
//!
//! Every account lives in `<data-dir>/<username>.txt`, its history in
//! `<data-dir>/<account_number>_transactions.txt`.
//!
//! ```sh
//! banking-ledger --port 5000 --data-dir ./accounts
//! ```

#![deny(missing_docs)]

use std::{net::IpAddr, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use banking_ledger::{http, ledger::Ledger};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "banking-ledger", version, about = "Toy banking ledger http server")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 5000)]
    port: u16,
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,
    /// Directory with account records and transaction logs, created if missing
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
    /// Requests running longer are answered with 408
    #[arg(long, default_value_t = 10)]
    request_timeout_secs: u64,
    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, default_value = "info")]
    log: String,
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tokio::fs::create_dir_all(&cli.data_dir)
        .await
        .with_context(|| format!("create data directory {}", cli.data_dir.display()))?;

    let ledger = Arc::new(Ledger::new(cli.data_dir.clone()));
    let app = http::router(ledger, Duration::from_secs(cli.request_timeout_secs));

    let addr = SocketAddr::new(cli.bind, cli.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!(%addr, data_dir = %cli.data_dir.display(), "banking ledger listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    Ok(())
}

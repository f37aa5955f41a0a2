use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use coinhouse_execution::{LedgerStore, Memory};
use coinhouse_webhook::{app, AppState, Args, SqliteLedger, ValidatedConfig};
use tracing::{info, warn};

fn init_tracing(level: tracing::Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.validate().context("invalid configuration")?;
    init_tracing(config.log_level);

    match config.ledger_path.clone() {
        Some(path) => {
            let ledger = SqliteLedger::open(&path)
                .with_context(|| format!("open ledger at {}", path.display()))?;
            info!(path = %path.display(), "using sqlite ledger");
            serve(config, ledger).await
        }
        None => {
            warn!("no --ledger-path given; balances are kept in memory only");
            serve(config, Memory::new()).await
        }
    }
}

async fn serve<S: LedgerStore + 'static>(config: ValidatedConfig, store: S) -> Result<()> {
    let addr = config.addr;
    info!(
        %addr,
        admins = config.admins.len(),
        starting_balance = config.engine.starting_balance,
        deterministic = config.deterministic_seed.is_some(),
        "starting coinhouse webhook"
    );
    let state = Arc::new(AppState::new(store, &config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, app(state))
        .await
        .context("webhook server failed")
}

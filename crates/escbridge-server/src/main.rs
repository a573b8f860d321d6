// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// escbridge: HTTP to ESC/POS print bridge.
//
// Loads `config.json` from the data directory (ESCBRIDGE_DATA_DIR, XDG data
// dir, or ~/.local/share/escbridge), opens the printer registry, and serves
// until Ctrl-C.

use escbridge_core::BridgeConfig;
use escbridge_core::config::data_dir;
use escbridge_print::SqlitePrinterRegistry;
use escbridge_server::{AppState, BridgeServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let data_dir = data_dir();
    let config = BridgeConfig::load(&data_dir)?;
    let registry = SqlitePrinterRegistry::open(config.registry_path_in(&data_dir))?;
    info!(
        data_dir = %data_dir.display(),
        listen_addr = %config.listen_addr,
        "starting escbridge"
    );

    let mut server = BridgeServer::new(config.listen_addr.clone());
    server.start(AppState::new(config, Box::new(registry))).await?;

    tokio::signal::ctrl_c().await?;
    server.stop().await?;
    Ok(())
}

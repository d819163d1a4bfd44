// Dad Dashboard - family dashboard server and headless client
//
// One binary, two halves:
// - Server (axum): persists the preference document across storage tiers and
//   proxies ESPN, Ticketmaster, Google Calendar and wttr.in for the dashboard
// - Client core: the dashboard's data synchronization (preferences, caches,
//   token refresh, refresh cadence) without any rendering, driven by the
//   `snapshot` and `watch` subcommands
//
// Architecture:
// - prefs: document model and tiered preferences store
// - upstream: third-party API clients and response shaping
// - server: HTTP routes over prefs + upstream
// - client: consumer of the HTTP routes

mod cli;
mod client;
mod config;
mod logging;
mod prefs;
mod server;
mod upstream;

use anyhow::Result;
use clap::Parser;
use config::Config;
use logging::ConsoleTarget;
use prefs::PreferencesStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Handle CLI commands first (snapshot, watch, config ...)
    // If a command was handled, exit early
    if cli::handle_cli(cli::Cli::parse()).await? {
        return Ok(());
    }

    // Create config file with defaults on first run
    Config::ensure_config_exists();
    let config = Config::from_env()?;

    // Hold the guard so buffered file logs flush on exit
    let _log_guard = logging::init(&config.logging, ConsoleTarget::Stdout);

    let store = Arc::new(PreferencesStore::from_config(&config.storage));
    tracing::info!(
        tiers = ?store.tier_names(),
        "Preferences store ready"
    );

    // Oneshot: the server stops accepting and drains once Ctrl+C arrives
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let mut server_handle = tokio::spawn(server::start_server(config, store, shutdown_rx));

    tokio::select! {
        // Bind failures and the like end the process without waiting for Ctrl+C
        result = &mut server_handle => return result?,
        signal = tokio::signal::ctrl_c() => signal?,
    }
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(());

    server_handle.await??;
    tracing::info!("Server stopped");
    Ok(())
}

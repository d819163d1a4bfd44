// CLI module - command-line argument parsing and handlers
//
// Subcommands:
// - serve (default): run the dashboard HTTP server
// - snapshot: boot the client core once and print every visible widget as JSON
// - watch: keep widgets refreshed on the dashboard cadence
// - connect-calendar: store the Google tokens from the OAuth redirect URL
// - config --show/--path/--reset/--edit: configuration management

use crate::client::Dashboard;
use crate::config::{Config, VERSION};
use crate::logging::{self, ConsoleTarget};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::process::Command;

/// Dad Dashboard - family dashboard server and headless client
#[derive(Parser)]
#[command(name = "dad-dashboard")]
#[command(version = VERSION)]
#[command(about = "Family dashboard server and headless client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the dashboard HTTP server (default)
    Serve,

    /// Fetch every visible widget once and print the result as JSON
    Snapshot {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,

        /// Behave like a page reload: skip cached widget data
        #[arg(long)]
        reload: bool,
    },

    /// Refresh widgets on the dashboard cadence, one JSON line per update
    Watch,

    /// Save the Google tokens carried by the OAuth redirect
    ConnectCalendar {
        /// Dashboard URL the OAuth callback redirected to (or its query string)
        redirect: String,
    },

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Open config file in $EDITOR
        #[arg(long)]
        edit: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Handle CLI commands. Returns true if a command was handled (exit after).
pub async fn handle_cli(cli: Cli) -> Result<bool> {
    match cli.command {
        None | Some(Commands::Serve) => Ok(false),
        Some(Commands::Snapshot { pretty, reload }) => {
            run_snapshot(pretty, reload).await?;
            Ok(true)
        }
        Some(Commands::Watch) => {
            run_watch().await?;
            Ok(true)
        }
        Some(Commands::ConnectCalendar { redirect }) => {
            run_connect_calendar(&redirect).await?;
            Ok(true)
        }
        Some(Commands::Config {
            show,
            reset,
            edit,
            path,
        }) => {
            if path {
                handle_config_path();
            } else if show {
                handle_config_show();
            } else if reset {
                handle_config_reset();
            } else if edit {
                handle_config_edit();
            } else {
                // No flag provided, show help
                println!("Usage: dad-dashboard config [--show|--reset|--edit|--path]");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
                println!("  --reset   Reset config file to defaults");
                println!("  --edit    Open config file in $EDITOR");
                println!("  --path    Show config file path");
            }
            Ok(true)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client commands
// ─────────────────────────────────────────────────────────────────────────────

async fn run_snapshot(pretty: bool, reload: bool) -> Result<()> {
    let config = Config::from_env()?;
    // stdout carries the JSON, so logs go to stderr
    let _log_guard = logging::init(&config.logging, ConsoleTarget::Stderr);

    let session_storage = Dashboard::session_storage(&config.client);
    if reload {
        session_storage.mark_page_load(Utc::now());
    }

    let mut dashboard = Dashboard::open(&config.client, &session_storage, Utc::now())
        .await
        .context("Failed to start dashboard client")?;
    let snapshot = dashboard.snapshot(Utc::now()).await;

    let json = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{json}");

    // Each snapshot is its own page visit
    session_storage.end()?;
    Ok(())
}

async fn run_watch() -> Result<()> {
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config.logging, ConsoleTarget::Stderr);

    let session_storage = Dashboard::session_storage(&config.client);
    let mut dashboard = Dashboard::open(&config.client, &session_storage, Utc::now())
        .await
        .context("Failed to start dashboard client")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    tracing::info!(server = %config.client.server_url, "Watching dashboard");
    dashboard
        .watch(shutdown_rx, |snapshot| match serde_json::to_string(snapshot) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "Snapshot not serializable"),
        })
        .await;

    session_storage.end()?;
    Ok(())
}

async fn run_connect_calendar(redirect: &str) -> Result<()> {
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config.logging, ConsoleTarget::Stderr);

    let session_storage = Dashboard::session_storage(&config.client);
    let mut dashboard = Dashboard::open(&config.client, &session_storage, Utc::now())
        .await
        .context("Failed to start dashboard client")?;
    let calendar = dashboard
        .connect_calendar(redirect, Utc::now())
        .await
        .context("Google account not connected")?;

    println!(
        "Google account connected, {} calendar(s) selected",
        calendar.calendar_ids.len()
    );
    session_storage.end()?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Config commands
// ─────────────────────────────────────────────────────────────────────────────

fn handle_config_path() {
    match Config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
    }
}

fn handle_config_show() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    let present = |v: &Option<String>| if v.is_some() { "set" } else { "unset" };

    println!("# Effective configuration (env > file > defaults)");
    println!();
    println!("bind_addr = {:?}", config.bind_addr.to_string());
    println!("public_url = {:?}", config.public_url);
    println!("oauth_redirect_uri = {:?}", config.oauth_redirect_uri());
    println!();
    println!("[storage]");
    println!("data_file = {:?}", config.storage.data_file.display().to_string());
    println!("database.enabled = {}", config.storage.database_enabled);
    println!(
        "database.path = {:?}",
        config.storage.database_path.display().to_string()
    );
    println!("database.pool_size = {}", config.storage.database_pool_size);
    println!();
    println!("[upstream]");
    println!("espn_api_url = {:?}", config.upstream.espn_api_url);
    println!("espn_web_url = {:?}", config.upstream.espn_web_url);
    println!("ticketmaster_url = {:?}", config.upstream.ticketmaster_url);
    println!("calendar_api_url = {:?}", config.upstream.calendar_api_url);
    println!("weather_url = {:?}", config.upstream.weather_url);
    println!("timeout_secs = {}", config.upstream.timeout_secs);
    println!();
    println!("[logging]");
    println!("level = {:?}", config.logging.level);
    println!("file_enabled = {}", config.logging.file_enabled);
    println!("file_rotation = {:?}", config.logging.file_rotation.as_str());
    println!();
    println!("[client]");
    println!("server_url = {:?}", config.client.server_url);
    println!("state_dir = {:?}", config.client.state_dir.display().to_string());
    println!("concert_fan_out = {}", config.client.concert_fan_out);
    println!();
    println!("# Credentials (environment only)");
    println!(
        "# TICKETMASTER_API_KEY: {}",
        present(&config.credentials.ticketmaster_api_key)
    );
    println!(
        "# GOOGLE_CALENDAR_API_KEY: {}",
        present(&config.credentials.google_calendar_api_key)
    );
    println!("# GOOGLE_CLIENT_ID: {}", present(&config.credentials.google_client_id));
    println!(
        "# GOOGLE_CLIENT_SECRET: {}",
        present(&config.credentials.google_client_secret)
    );

    // Show source info
    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
}

fn handle_config_reset() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        let _ = std::io::stderr().flush();

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err()
            || !input.trim().eq_ignore_ascii_case("y")
        {
            println!("Aborted.");
            return;
        }
    }

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating directory: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = std::fs::write(&path, Config::default().to_toml()) {
        eprintln!("Error writing config: {}", e);
        std::process::exit(1);
    }

    println!("Config reset to defaults: {}", path.display());
}

fn handle_config_edit() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if !path.exists() {
        Config::ensure_config_exists();
        println!("Created new config file: {}", path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            if cfg!(windows) {
                "notepad".to_string()
            } else {
                "nano".to_string()
            }
        });

    println!("Opening {} with {}", path.display(), editor);

    match Command::new(&editor).arg(&path).status() {
        Ok(status) if status.success() => {}
        Ok(status) => eprintln!("Editor exited with status: {}", status),
        Err(e) => {
            eprintln!("Failed to launch editor '{}': {}", editor, e);
            std::process::exit(1);
        }
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{LevelFilter, info, warn};
use tokio::signal;

mod api;
mod buttons;
mod config;
mod console;
mod hardware;
mod manager;
mod messages;
mod scanner;

use crate::buttons::{ButtonDispatcher, ButtonLines};
use crate::console::Console;
use crate::scanner::{ButtonMenu, UidSource};

/// Forwards RFID badge scans and button presses to the game API.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `station.machine_id` from the config file
    #[arg(long)]
    machine_id: Option<String>,

    /// Use the console for UIDs and buttons even if hardware is present
    #[arg(long)]
    simulate: bool,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    let args = Args::parse();
    let mut config = config::AppConfig::load(&args.config)?;
    if let Some(machine_id) = args.machine_id {
        config.station.machine_id = Some(machine_id);
    }
    let config = config;
    let machine_id = config.station.machine_id();

    info!("RFID Scanner + Buttons started — MACHINE_ID={}", machine_id);
    info!("RFID endpoint:    {}", config.api.rfid_url());
    info!("Buttons endpoint: {}", config.api.buttons_url());

    let sink = Arc::new(api::ApiClient::new(&config.api)?);
    let console = Console::stdio();

    let uid_source: Box<dyn UidSource> = if args.simulate {
        Box::new(console.clone())
    } else {
        match hardware::open_reader(&config.reader) {
            Ok(reader) => reader,
            Err(err) => {
                warn!("RFID reader not available ({}) — running in simulation mode", err);
                Box::new(console.clone())
            }
        }
    };

    let dispatcher = ButtonDispatcher::start(Arc::clone(&sink), machine_id, &config.buttons);
    let lines: Option<Box<dyn ButtonLines>> = if args.simulate {
        None
    } else {
        match hardware::open_buttons(&config.buttons, dispatcher.trigger()) {
            Ok(lines) => Some(lines),
            Err(err) => {
                warn!("GPIO not available ({}) — buttons simulated on the console", err);
                None
            }
        }
    };
    let menu: Option<Box<dyn ButtonMenu>> = if lines.is_some() {
        None
    } else {
        Some(Box::new(console.clone()))
    };

    let manager = manager::Manager::new(uid_source, menu, Arc::clone(&sink), &config);
    let mut station = manager::Station::new(dispatcher, lines, &config);
    station.run(manager, shutdown_signal()).await?;

    Ok(())
}

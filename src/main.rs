// =============================================================================
// Sofiya - Main Entry Point
// =============================================================================
//
// Author: Sofiya Bot Team
// Date: 2026-10-04
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Entry point of the `sofiya` binary. `run` drives the moderation service
//   over the JSON-lines stdio transport with the maintenance scheduler;
//   the other commands run one store or rental operation and exit.
//
// Architecture:
//   • Multi-threaded Tokio runtime
//   • Configuration via TOML + SOFIYA_* environment variables
//   • Structured logging with tracing, console on stderr
//   • One JSON file per entity type under the data directory
//
// Runtime Requirements:
//   • SOFIYA_CONFIG or --config pointing to a config file (optional)
//   • Writable data and log directories
//
// =============================================================================

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde::Serialize;
use sofiya_bot::{logging, BotConfig, Scheduler, Service};
use sofiya_core::{SharedClock, SystemClock};
use sofiya_rental::{AccessController, RentalManager};
use sofiya_store::Database;
use tokio::{
    io::{self, BufReader},
    signal,
    sync::mpsc,
};
use tracing::{error, info, warn};

use crate::clap::{Commands, RentalCommands};
use crate::stdio::{forward_events, LineTransport};

mod clap;
mod stdio;

/// Capacity of the inbound event queue
const EVENT_QUEUE: usize = 256;

#[tokio::main]
async fn main() {
    let args = clap::parse();

    if let Commands::InitConfig { path } = &args.command {
        if let Err(e) = init_config(path.clone()) {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match BotConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let guard = match logging::init(&config.logging, args.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "🚀 Starting {} v{} ({})",
        config.bot.name,
        crate::clap::version(),
        config.storage.data_dir.display()
    );

    let result = execute(args.command, config).await;
    if let Err(e) = result {
        error!("❌ {:#}", e);
        // process::exit skips destructors; flush file logs first.
        drop(guard);
        std::process::exit(1);
    }
}

async fn execute(command: Commands, config: BotConfig) -> anyhow::Result<()> {
    let clock: SharedClock = Arc::new(SystemClock);
    let db = Arc::new(
        Database::open(config.storage.clone(), clock.clone())
            .await
            .context("Failed to open the record store")?,
    );

    match command {
        Commands::Run { no_scheduler } => run_service(config, db, clock, no_scheduler).await,
        Commands::Backup => {
            db.flush_all().await?;
            let report = db.snapshot().await?;
            print_json(&report)
        }
        Commands::Sweep => {
            let rentals = RentalManager::new(db.clone());
            let expired = rentals.sweep_expired().await?;
            let expiring = rentals
                .expiring_within(config.rental.expiry_warning_hours)
                .await;
            info!("⌛ {} rentals expired, {} ending soon", expired, expiring.len());
            print_json(&expiring)
        }
        Commands::Rental { action } => {
            rental_command(&config, RentalManager::new(db.clone()), action).await
        }
        Commands::Access { group } => {
            let rentals = RentalManager::new(db.clone());
            let access = AccessController::new(db.clone(), rentals, config.rental.trial_hours);
            let decision = access.decide(&group).await;
            println!("{}: {:?}", group, decision);
            db.flush_all().await?;
            Ok(())
        }
        Commands::InitConfig { path } => init_config(path),
    }
}

async fn run_service(
    config: BotConfig,
    db: Arc<Database>,
    clock: SharedClock,
    no_scheduler: bool,
) -> anyhow::Result<()> {
    let transport = Arc::new(LineTransport::new(io::stdout()));
    let service = Arc::new(Service::new(config, db, transport));

    if let Err(e) = service.load_active_groups().await {
        warn!("⚠️ Failed to load active groups: {}", e);
    }

    let mut scheduler = Scheduler::new(service.clone(), clock);
    if !no_scheduler {
        scheduler.start()?;
    }

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    let worker = tokio::spawn(service.clone().run(rx));

    // Dropping the sender on either branch lets the worker drain and stop.
    tokio::select! {
        forwarded = forward_events(BufReader::new(io::stdin()), tx) => {
            info!("📭 Input closed after {} events", forwarded?);
        }
        sig = shutdown_signal() => {
            warn!("Received {}, shutting down...", sig);
        }
    }

    scheduler.stop().await;
    worker.await??;
    Ok(())
}

async fn rental_command(
    config: &BotConfig,
    rentals: RentalManager,
    action: RentalCommands,
) -> anyhow::Result<()> {
    match action {
        RentalCommands::Create { group, plan, hours } => {
            let hours = match hours {
                Some(hours) => hours,
                None => config
                    .rental
                    .plan(&plan)
                    .map(|p| p.duration_hours)
                    .ok_or_else(|| anyhow!("Unknown plan '{}'; pass --hours", plan))?,
            };
            let rental = rentals.create(&group, &plan, hours).await?;
            print_json(&rental)
        }
        RentalCommands::Extend { group, hours } => match rentals.extend(&group, hours).await? {
            Some(rental) => print_json(&rental),
            None => bail!("No rental for group {}", group),
        },
        RentalCommands::Delete { group } => match rentals.delete(&group).await? {
            Some(rental) => print_json(&rental),
            None => bail!("No rental for group {}", group),
        },
        RentalCommands::Show { group } => match rentals.rental(&group).await {
            Some(rental) => print_json(&rental),
            None => bail!("No rental for group {}", group),
        },
    }
}

fn init_config(path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = path
        .or_else(sofiya_bot::config::default_config_path)
        .ok_or_else(|| anyhow!("No config directory on this system; pass a path"))?;

    if BotConfig::create_default_config(&path)? {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!("Configuration already exists at {}", path.display());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = terminate => "SIGTERM",
    }
}

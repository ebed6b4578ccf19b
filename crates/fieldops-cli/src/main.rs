use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fieldops_core::model::DeviceRegistration;
use fieldops_core::storage::{Config, Database};
use fieldops_core::sync::{
    ConnectionType, ConnectivityMonitor, ConnectivityState, CycleOutcome, RemoteClient,
    SyncEngine, SyncScheduler, SyncTrigger,
};

#[derive(Parser)]
#[command(name = "fieldops-cli", version, about = "FieldOps CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronization control
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Device registration
    Device {
        #[command(subcommand)]
        action: DeviceAction,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Run one sync cycle now, regardless of connectivity state
    Now,
    /// Show sync status and per-state record counts
    Status,
    /// Run the sync scheduler in the foreground until Ctrl-C
    Watch,
}

#[derive(Subcommand)]
enum DeviceAction {
    /// Queue this device's registration and sync it to the server
    Register {
        /// Device name; defaults to the configured one
        #[arg(long)]
        name: Option<String>,
    },
}

fn build_engine(config: &Config) -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let client = RemoteClient::new(&config.server.base_url, config.server.auth_token.clone())?;
    Ok(SyncEngine::new(db, client))
}

fn print_outcome(outcome: &CycleOutcome) -> i32 {
    match outcome {
        CycleOutcome::Completed => {
            println!("sync complete");
            0
        }
        CycleOutcome::Skipped => {
            println!("a sync cycle is already running");
            0
        }
        CycleOutcome::Expired => {
            println!("sync interrupted before completion; progress kept");
            1
        }
        CycleOutcome::Failed(err) => {
            eprintln!("sync failed: {err}");
            1
        }
    }
}

async fn sync_now(config: &Config) -> Result<i32, Box<dyn std::error::Error>> {
    let engine = build_engine(config)?;
    let outcome = engine.sync_cycle(SyncTrigger::Manual, None).await;
    Ok(print_outcome(&outcome))
}

fn sync_status() -> Result<i32, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match db.checkpoint()? {
        Some(at) => println!("last completed sync: {}", at.to_rfc3339()),
        None => println!("never synced"),
    }
    let counts = db.status_counts()?;
    if counts.is_empty() {
        println!("no local records");
    }
    for (status, count) in counts {
        println!("{:>8}: {count}", status.as_str());
    }
    Ok(0)
}

async fn sync_watch(config: &Config) -> Result<i32, Box<dyn std::error::Error>> {
    let engine = Arc::new(build_engine(config)?);

    // Without OS path callbacks wired in, the daemon assumes it is
    // online; the periodic trigger does the rest.
    let (monitor, restored) = ConnectivityMonitor::new();
    monitor.update(ConnectivityState::online(ConnectionType::Other));

    let (scheduler, handle) = SyncScheduler::new(Arc::clone(&engine), monitor.watch(), restored);
    let loop_task = tokio::spawn(scheduler.run());

    println!("sync scheduler running, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    let _ = handle.shutdown.send(());
    let _ = loop_task.await;
    Ok(0)
}

async fn device_register(
    config: &Config,
    name: Option<String>,
) -> Result<i32, Box<dyn std::error::Error>> {
    let engine = build_engine(config)?;
    let device_name = name.unwrap_or_else(|| config.device.name.clone());
    {
        let db = engine.database();
        let db = db.lock().unwrap();
        let registration = DeviceRegistration {
            device_id: db.device_id()?,
            device_name: device_name.clone(),
            platform: config.device.platform.clone(),
            push_token: None,
        };
        db.upsert_device_registration(&registration)?;
    }
    println!("device registration queued ({device_name})");

    let outcome = engine.sync_cycle(SyncTrigger::Manual, None).await;
    Ok(print_outcome(&outcome))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Sync { action } => match action {
            SyncAction::Now => sync_now(&config).await,
            SyncAction::Status => sync_status(),
            SyncAction::Watch => sync_watch(&config).await,
        },
        Commands::Device { action } => match action {
            DeviceAction::Register { name } => device_register(&config, name).await,
        },
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

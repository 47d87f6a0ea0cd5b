use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use control_core::{
    ControlCoordinator, ControlEvent, FreshnessTracker, HttpControlPlane,
};
use shared::domain::ControlAction;
use tokio::sync::broadcast;

mod config;

#[derive(Parser, Debug)]
#[command(name = "panel", about = "Control panel for a single remote compute instance")]
struct Args {
    /// Control backend url; overrides panel.toml and PANEL_SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current instance status.
    Status,
    /// Boot the instance up.
    StartInstance,
    /// Shut the instance down.
    StopInstance,
    /// Launch the service on the running instance.
    StartService,
    /// Poll status on an interval and print each confirmed read.
    Watch {
        #[arg(long, default_value_t = 15)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }

    let freshness = Arc::new(FreshnessTracker::with_dwell(Duration::from_secs(
        settings.freshness_dwell_secs,
    )));
    let coordinator = ControlCoordinator::new_with_status_listener(
        Arc::new(HttpControlPlane::new(&settings.server_url)?),
        Arc::clone(&freshness) as _,
    );
    let mut events = coordinator.subscribe_events();

    match args.command {
        Command::Status => {
            coordinator.fetch_status().await;
            drain_events(&mut events);
            print_snapshot(&coordinator, &freshness).await;
        }
        Command::StartInstance => {
            run_action(&coordinator, &freshness, &mut events, ControlAction::StartInstance).await?;
        }
        Command::StopInstance => {
            run_action(&coordinator, &freshness, &mut events, ControlAction::StopInstance).await?;
        }
        Command::StartService => {
            run_action(&coordinator, &freshness, &mut events, ControlAction::StartService).await?;
        }
        Command::Watch { interval_secs } => loop {
            coordinator.fetch_status().await;
            drain_events(&mut events);
            print_snapshot(&coordinator, &freshness).await;
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        },
    }

    Ok(())
}

/// Gates the action on a freshly fetched status, dispatches it, then waits
/// for the reconciliation fetch to confirm where the instance ended up.
async fn run_action(
    coordinator: &Arc<ControlCoordinator>,
    freshness: &Arc<FreshnessTracker>,
    events: &mut broadcast::Receiver<ControlEvent>,
    action: ControlAction,
) -> Result<()> {
    coordinator.fetch_status().await;
    drain_events(events);

    let snapshot = coordinator.snapshot().await;
    let allowed = match action {
        ControlAction::StartInstance => snapshot.instance_active,
        ControlAction::StopInstance => snapshot.shutdown_active,
        ControlAction::StartService => snapshot.service_active,
    };
    if !allowed {
        bail!(
            "cannot {} while the instance is {}",
            action.describe(),
            snapshot.status.state
        );
    }

    match action {
        ControlAction::StartInstance => coordinator.start_instance().await,
        ControlAction::StopInstance => coordinator.stop_instance().await,
        ControlAction::StartService => coordinator.start_service().await,
    }
    tracing::info!(action = action.as_str(), "command dispatched");
    println!("issued {}; waiting for confirmation", action.describe());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(ControlEvent::StatusUpdated(_))) => break,
            Ok(Ok(ControlEvent::Error(message))) => eprintln!("{message}"),
            Ok(Err(_)) | Err(_) => break,
        }
    }

    print_snapshot(coordinator, freshness).await;
    Ok(())
}

fn drain_events(events: &mut broadcast::Receiver<ControlEvent>) {
    while let Ok(event) = events.try_recv() {
        if let ControlEvent::Error(message) = event {
            eprintln!("{message}");
        }
    }
}

async fn print_snapshot(coordinator: &Arc<ControlCoordinator>, freshness: &Arc<FreshnessTracker>) {
    let snapshot = coordinator.snapshot().await;
    let marker = if freshness.is_fresh().await {
        "fresh"
    } else {
        "stale"
    };
    let address = snapshot.status.ip_address.as_deref().unwrap_or("-");
    println!(
        "state={} ({marker}) address={address} boot-up={} launch={} shutdown={}",
        snapshot.status.state,
        snapshot.instance_active,
        snapshot.service_active,
        snapshot.shutdown_active
    );
}

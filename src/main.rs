use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use home_herald::alert::{Dispatcher, LoggingSink, alert_channel};
use home_herald::commands::{CommandRouter, SessionContext};
use home_herald::config::HeraldConfig;
use home_herald::domains::{
    BinsDriver, BinsState, BudgetDriver, BudgetState, TrainsDriver, TrainsState,
};
use home_herald::provider::UnconfiguredProvider;
use home_herald::sched::{reconcile_domain, run_domain};
use home_herald::server::{AppState, CommandState, build_router, command_routes};
use home_herald::store::{SharedStore, record_path};
use home_herald::types::Domain;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "home_herald=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = HeraldConfig::from_env();
    info!(state_dir = %config.state_dir.display(), "starting home-herald");

    // Stores: one record per domain, corruption degrades only that domain
    let budget_store = SharedStore::load_or_default(
        record_path(&config.state_dir, Domain::Budget.record_stem()),
        BudgetState::new(Utc::now(), config.weekly_amount),
    );
    let bins_store = SharedStore::load_or_default(
        record_path(&config.state_dir, Domain::Bins.record_stem()),
        BinsState::new(),
    );
    let trains_store = SharedStore::load_or_default(
        record_path(&config.state_dir, Domain::Trains.record_stem()),
        TrainsState::new(),
    );

    // No live transports wired yet: providers fail transiently and the
    // sink logs, so the whole pipeline runs dry end to end.
    let budget = BudgetDriver::new(budget_store);
    let bins = BinsDriver::new(bins_store, UnconfiguredProvider, config.retry_fallback);
    let trains = TrainsDriver::new(
        trains_store,
        UnconfiguredProvider,
        config.watch_poll_interval,
    );

    let shutdown = CancellationToken::new();
    let (alerts, alert_rx) = alert_channel();

    let dispatcher = Dispatcher::new(LoggingSink, config.recipients.clone());
    let dispatcher_task = tokio::spawn(dispatcher.run(alert_rx, shutdown.clone()));

    // Catch up persisted state with the clock before scheduling anything
    reconcile_domain(&budget, &alerts).await;
    reconcile_domain(&bins, &alerts).await;
    reconcile_domain(&trains, &alerts).await;

    let mut nudges: HashMap<Domain, mpsc::Sender<_>> = HashMap::new();
    let mut scheduler_tasks = Vec::new();
    {
        let (tx, rx) = mpsc::channel(8);
        nudges.insert(Domain::Budget, tx);
        scheduler_tasks.push(tokio::spawn(run_domain(
            budget.clone(),
            rx,
            alerts.clone(),
            shutdown.clone(),
        )));
    }
    {
        let (tx, rx) = mpsc::channel(8);
        nudges.insert(Domain::Bins, tx);
        scheduler_tasks.push(tokio::spawn(run_domain(
            bins.clone(),
            rx,
            alerts.clone(),
            shutdown.clone(),
        )));
    }
    {
        let (tx, rx) = mpsc::channel(8);
        nudges.insert(Domain::Trains, tx);
        scheduler_tasks.push(tokio::spawn(run_domain(
            trains.clone(),
            rx,
            alerts.clone(),
            shutdown.clone(),
        )));
    }

    // Commands come in over HTTP; the nudge senders the router holds keep
    // the schedulers responsive to state changed by a command.
    let router = CommandRouter::new(budget, bins, trains, nudges);
    let session = SessionContext::with_station(config.default_station);

    let app = build_router(AppState::new(config.state_dir.clone()))
        .merge(command_routes(CommandState::new(router, session)));
    info!(addr = %config.listen_addr, "listening");

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.listen_addr, error = %e, "failed to bind");
            return;
        }
    };

    let server_shutdown = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await });

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    shutdown.cancel();
    for task in scheduler_tasks {
        let _ = task.await;
    }
    let _ = dispatcher_task.await;
    info!("home-herald stopped");
}

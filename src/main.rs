// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::Client;
use lbaas::{
    cli::{Cli, OperatorConfig},
    constants::{ENV_LOG_FORMAT, LEADER_LOCK_NAME, TOKIO_WORKER_THREADS},
    controller, crd_install,
    errors::{ControllerError, LeaderElectionError},
    leader::{lease::KubeLeaseLock, LeaderElector, LeaderOutcome},
    metrics,
    version::BuildInfo,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("lbaas-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn initialize_logging() {
    // RUST_LOG selects the level (default info), RUST_LOG_FORMAT=json switches
    // to structured output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging();

    let build = BuildInfo::get();
    info!(
        version = build.version,
        git_commit = build.git_commit,
        build_date = build.build_date,
        rustc = build.rustc_version,
        platform = %build.platform,
        "Starting LoadBalancer operator"
    );
    metrics::record_build_info(&build);

    let config = match OperatorConfig::from_env(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid operator configuration");
            return Err(e.into());
        }
    };
    info!(
        namespace = %config.namespace,
        pod = %config.pod_name,
        identity = %config.leader.identity,
        workers = config.controller.workers,
        "Operator configured"
    );

    let client = Client::try_default().await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_addr = config.metrics_addr;
    let metrics_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_addr, metrics_shutdown).await {
            error!(error = %ControllerError::from(e), "Metrics endpoint stopped");
        }
    });

    tokio::spawn(forward_shutdown(shutdown_signal(), shutdown_tx));

    let lock = Arc::new(KubeLeaseLock::new(
        client.clone(),
        &config.namespace,
        LEADER_LOCK_NAME,
    ));
    let elector = Arc::new(LeaderElector::new(lock, config.leader.clone())?);

    let mut guard = match elector.acquire(shutdown_rx.clone()).await {
        Ok(guard) => guard,
        Err(LeaderElectionError::Cancelled) => {
            info!("Shutdown requested while waiting for leadership");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    info!(identity = %guard.identity(), "Started leading");

    let result = match guard
        .run_while_leading(run_as_leader(client, &config, shutdown_rx))
        .await
    {
        LeaderOutcome::Completed(result) => result,
        LeaderOutcome::Lost => {
            // Another replica may already be reconciling; stop immediately.
            error!(identity = %config.leader.identity, "CRITICAL: leadership lost, exiting");
            std::process::exit(1);
        }
    };

    if let Err(e) = guard.release().await {
        warn!(error = %e, "Failed to release leader lease, it will expire on its own");
    }

    match result {
        Ok(()) => {
            info!("LoadBalancer operator stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "CRITICAL: LoadBalancer controller failed");
            Err(e)
        }
    }
}

async fn run_as_leader(
    client: Client,
    config: &OperatorConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    if config.create_crd {
        crd_install::ensure_load_balancer_crd(&client).await?;
    }
    controller::run(
        client,
        &config.pod_name,
        config.controller.clone(),
        shutdown,
    )
    .await?;
    Ok(())
}

/// Resolve on SIGTERM or Ctrl+C.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler, using Ctrl+C only"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        futures::future::pending::<()>().await;
    }
    info!("Received SIGINT");
}

/// Flip the shutdown channel once `signal` resolves.
async fn forward_shutdown<F>(signal: F, tx: watch::Sender<bool>)
where
    F: Future<Output = ()>,
{
    signal.await;
    info!("Shutting down gracefully");
    let _ = tx.send(true);
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;

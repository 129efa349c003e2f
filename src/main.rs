// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::Client;
use rrsync::{
    cli::OperatorArgs,
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    metrics::{PrometheusStatusSink, METRICS_REGISTRY},
    pdns::PdnsClient,
    reconcilers::UniquenessIndex,
    record_controller::{run_index_feeder, run_rrset_controller},
    server::{run_metrics_server, Health},
};
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let args = OperatorArgs::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("rrsync-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

/// Initialize logging.
///
/// `RUST_LOG` selects the level (default `info`), `RUST_LOG_FORMAT=json`
/// switches to structured output.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

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

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

async fn async_main(args: OperatorArgs) -> Result<()> {
    init_tracing();

    info!("Starting rrsync PowerDNS RRset operator");
    debug!(pdns = ?args.pdns_config(), "Configuration loaded");

    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let records = Arc::new(PdnsClient::new(&args.pdns_config())?);
    let status_sink = Arc::new(PrometheusStatusSink::new(&METRICS_REGISTRY)?);
    let index = Arc::new(UniquenessIndex::new());
    let context = Arc::new(Context::kubernetes(
        client.clone(),
        records,
        status_sink,
        index.clone(),
    ));

    let health = Arc::new(Health::new());
    let namespace = args.watch_namespace.clone();
    health.mark_ready();

    // Any task finishing ends the process; Kubernetes restarts the pod
    tokio::select! {
        result = run_rrset_controller(client.clone(), context, namespace.clone()) => {
            error!("CRITICAL: RRset controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("RRset controller exited unexpectedly without error")
        }
        result = run_index_feeder(client, index, namespace) => {
            error!("CRITICAL: RRset index watch exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("RRset index watch exited unexpectedly without error")
        }
        result = run_metrics_server(args.metrics_addr, health) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        result = shutdown_signal() => {
            result?;
            info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sidecard — the function sidecar runtime's worker-process supervisor
//! daemon. Parses config (C10), wires the production supervisor/dispatcher
//! stack, starts the Reaper (C8), and serves the adapter-facing HTTP front
//! door (spec §6) until a termination signal arrives.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::process::ExitCode;

use clap::Parser;
use sidecar_daemon::{http, logging, Cli};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.into_config();

    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        return ExitCode::from(1);
    }

    if let Err(e) = logging::init(&config) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(1);
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.scratch_root).await {
        error!(error = %e, path = %config.scratch_root.display(), "failed to create scratch root");
        return ExitCode::from(1);
    }

    let listener = match tokio::net::TcpListener::bind(config.grpc_address.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, address = %config.grpc_address, "failed to bind adapter-facing listener");
            return ExitCode::from(1);
        }
    };

    info!(address = %config.grpc_address, "sidecard listening");

    let runtime = sidecar_daemon::start(config);
    let router = http::build_router(runtime.dispatcher);

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return ExitCode::from(1);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            return ExitCode::from(1);
        }
    };

    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    };

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await;

    runtime.reaper.abort();

    match serve_result {
        Ok(()) => {
            info!("sidecard stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "http server exited with an error");
            ExitCode::from(1)
        }
    }
}

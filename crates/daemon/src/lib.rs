// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sidecar-daemon: CLI/config loading (C10), host-side logging, and the
//! adapter-facing HTTP front door that stands in for the composition
//! engine's own transport (spec §1, §6).

pub mod config;
pub mod http;
pub mod logging;

use std::sync::Arc;

use sidecar_adapters::install_runner::ProcessInstallRunner;
use sidecar_adapters::worker_client::{HttpWorkerClient, HttpWorkerClientFactory};
use sidecar_core::{Clock, Config, SystemClock};
use sidecar_engine::{spawn_reaper, Dispatcher, WorkerSupervisor};
use tokio::task::JoinHandle;

pub use config::Cli;

/// The production instantiation of the generic supervisor/dispatcher
/// stack: real loopback HTTP (`reqwest`), real process spawn for
/// installs, real wall-clock time.
pub type ProdSupervisor = WorkerSupervisor<HttpWorkerClient, HttpWorkerClientFactory, ProcessInstallRunner, SystemClock>;
pub type ProdDispatcher = Dispatcher<HttpWorkerClient, HttpWorkerClientFactory, ProcessInstallRunner, SystemClock>;

/// Everything `main` needs once config is loaded: the dispatcher (for the
/// HTTP router) and the reaper's task handle (to abort on shutdown).
pub struct Runtime {
    pub dispatcher: Arc<ProdDispatcher>,
    pub reaper: JoinHandle<()>,
}

/// Wires the production stack together and starts the Reaper (spec §4.8).
/// Assumes `config.validate()` has already been called.
pub fn start(config: Config) -> Runtime {
    let client_factory = HttpWorkerClientFactory::new();
    let install_runner = ProcessInstallRunner::npm_focus_install();
    let clock = SystemClock;

    let supervisor = Arc::new(WorkerSupervisor::new(
        config.clone(),
        client_factory,
        install_runner,
        clock,
    ));

    let reaper = spawn_reaper(Arc::clone(&supervisor), config.gc_interval, config.idle_timeout);
    let dispatcher = Arc::new(Dispatcher::new(&config, supervisor, SystemClock));

    Runtime { dispatcher, reaper }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sidecar-adapters: the two pluggable capability seams named in spec §9 —
//! `WorkerClient` (C5) and `InstallRunner` (the engine behind C4's
//! InstallQueue) — plus their production and fake implementations.

pub mod install_runner;
pub mod worker_client;

pub use install_runner::{CancelToken, InstallError, InstallRunner, OutputSink, StreamTag};
pub use worker_client::{WorkerClient, WorkerClientError, WorkerClientFactory};

#[cfg(any(test, feature = "test-support"))]
pub use install_runner::{FakeInstallRunner, InstallCall};

#[cfg(any(test, feature = "test-support"))]
pub use worker_client::{FakeWorkerClient, FakeWorkerClientFactory, WorkerCall};

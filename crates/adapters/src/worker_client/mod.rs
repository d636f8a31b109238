// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C5 WorkerClient: a loopback HTTP client bound to one worker's port
//! (spec §4.5). Readiness polling, the `/execute` call, and a lightweight
//! health probe.

mod http;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use http::{HttpWorkerClient, HttpWorkerClientFactory};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeWorkerClient, FakeWorkerClientFactory, WorkerCall};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a single worker's HTTP endpoint (spec §7's wire-level
/// kinds). `WorkerSupervisor`/`Dispatcher` map these onto
/// `sidecar_core::SidecarError`.
#[derive(Debug, Error, Clone)]
pub enum WorkerClientError {
    #[error("worker did not become ready within the timeout")]
    ReadyTimeout,

    #[error("worker returned HTTP {0}")]
    Http(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("call timed out")]
    Timeout,
}

/// A client bound to one worker's loopback endpoint. One instance per
/// `WorkerRecord` (spec §3).
#[async_trait]
pub trait WorkerClient: Send + Sync + 'static {
    /// Poll `GET /ready` until `200` or `timeout` elapses, at `interval`
    /// spacing (spec §4.5).
    async fn wait_ready(
        &self,
        timeout: Duration,
        interval: Duration,
    ) -> Result<(), WorkerClientError>;

    /// `POST /execute` with the opaque JSON body, bounded by
    /// `request_timeout` (spec §4.5, §6).
    async fn execute(
        &self,
        body: serde_json::Value,
        request_timeout: Duration,
    ) -> Result<serde_json::Value, WorkerClientError>;

    /// A single lightweight readiness call, used for health checks on the
    /// fast path of `acquire` (spec §4.6 step 2) and before every
    /// Dispatcher attempt (spec §4.7).
    async fn probe(&self) -> bool;
}

/// Builds a `WorkerClient` bound to a specific worker's port. Kept
/// separate from `WorkerClient` itself so the supervisor can construct one
/// client per worker while sharing connection-pool state (e.g. a
/// `reqwest::Client`) across all of them.
pub trait WorkerClientFactory: Clone + Send + Sync + 'static {
    type Client: WorkerClient;

    fn connect(&self, port: u16) -> Self::Client;
}

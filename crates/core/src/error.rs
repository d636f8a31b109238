// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy shared across the workspace (spec §7: kinds, not type
//! names — every fallible path in `sidecar-adapters`/`sidecar-engine` maps
//! onto one of these variants via `#[from]`).

use thiserror::Error;

/// Top-level error kind surfaced to the adapter-facing `Run` entry point.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("port exhausted")]
    PortExhausted,

    #[error("worker start failed: {0}")]
    WorkerStart(String),

    #[error("worker transport error: {0}")]
    WorkerTransport(String),

    #[error("worker returned HTTP {0}")]
    WorkerHttp(u16),

    #[error("worker call timed out")]
    WorkerTimeout,

    /// The worker ran and returned `{ "error": ... }` — a user-code
    /// failure, not infrastructure. Terminal: never retried.
    #[error("user function error (code {code}): {message}")]
    UserFunction {
        code: i64,
        message: String,
        stack: Option<String>,
    },

    #[error("canceled")]
    Canceled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SidecarError {
    /// Infrastructure errors are retried by the Dispatcher (spec §7);
    /// `UserFunction` and `Canceled` are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SidecarError::WorkerStart(_)
                | SidecarError::WorkerTransport(_)
                | SidecarError::WorkerTimeout
                | SidecarError::WorkerHttp(_)
                | SidecarError::PortExhausted
                | SidecarError::Sandbox(_)
        )
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pluggable seam behind C4 InstallQueue: actually running a
//! package-manager "focus install" for one sandbox (spec §4.4). The queue
//! itself (bounded concurrency, FIFO waiters) lives in `sidecar-engine`;
//! this crate only supplies the capability to run (and cancel) one
//! install.

mod cancel;
mod process;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use cancel::CancelToken;
pub use process::ProcessInstallRunner;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeInstallRunner, InstallCall};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Which stream an install runner's output line came from, for tagging
/// through `LogTap` (spec §4.4, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTag {
    Stdout,
    Stderr,
}

#[derive(Debug, Error, Clone)]
pub enum InstallError {
    #[error("install failed: {0}")]
    Failed(String),
    #[error("canceled")]
    Canceled,
}

/// Receives one output line at a time as the install process runs, so it
/// can be funneled live through `LogTap` instead of buffered until exit.
pub type OutputSink = Arc<dyn Fn(StreamTag, &[u8]) + Send + Sync>;

/// Runs a single package-manager install for a sandbox. Install failure is
/// non-fatal to the supervisor (spec §4.4) — callers decide what to do
/// with `Err`; this trait just reports it.
#[async_trait]
pub trait InstallRunner: Clone + Send + Sync + 'static {
    async fn install(
        &self,
        sandbox_path: &Path,
        on_output: OutputSink,
        cancel: CancelToken,
    ) -> Result<(), InstallError>;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker record (spec §3): everything the registry owns for one live
//! worker. `WorkerSupervisor` is the only thing that mutates a record's
//! lifecycle; `Reaper` and `Dispatcher` only reach it by fingerprint
//! look-up, never via a stored pointer (spec §9).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex as SyncMutex;
use sidecar_adapters::WorkerClient;
use sidecar_core::Fingerprint;
use tokio::process::Child;
use tokio::sync::Mutex as AsyncMutex;

use crate::log_tap::LogTap;

/// Worker lifecycle states (spec §4.6). `Creating` and `WaitingReady` are
/// transient and only observed by the supervisor while building a record;
/// once inserted into the registry a record is always `Ready` or
/// `Terminating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Ready,
    Terminating,
}

pub struct WorkerRecord<C: WorkerClient> {
    pub fingerprint: Fingerprint,
    pub port: u16,
    pub sandbox_path: PathBuf,
    pub client: C,
    pub log_tap: std::sync::Arc<LogTap>,
    child: AsyncMutex<Child>,
    /// Serializes request submission and the `last_used` update for this
    /// worker (spec §3, §5) — concurrent requests to the same worker queue
    /// here, FIFO.
    record_lock: AsyncMutex<()>,
    last_used: SyncMutex<Instant>,
    state: SyncMutex<WorkerState>,
}

impl<C: WorkerClient> WorkerRecord<C> {
    pub fn new(
        fingerprint: Fingerprint,
        port: u16,
        sandbox_path: PathBuf,
        client: C,
        log_tap: std::sync::Arc<LogTap>,
        child: Child,
        now: Instant,
    ) -> Self {
        Self {
            fingerprint,
            port,
            sandbox_path,
            client,
            log_tap,
            child: AsyncMutex::new(child),
            record_lock: AsyncMutex::new(()),
            last_used: SyncMutex::new(now),
            state: SyncMutex::new(WorkerState::Ready),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn mark_terminating(&self) {
        *self.state.lock() = WorkerState::Terminating;
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_used.lock())
    }

    pub async fn record_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.record_lock.lock().await
    }

    pub fn touch(&self, now: Instant) {
        *self.last_used.lock() = now;
    }

    /// Graceful-then-forceful termination (spec §4.6 `restart`): send
    /// SIGTERM, wait up to `terminate_grace`, SIGKILL if still alive, then
    /// flush the log tap so any retained partial line is emitted.
    pub async fn terminate(&self, terminate_grace: Duration) {
        let mut child = self.child.lock().await;
        terminate_child(&mut child, terminate_grace).await;
        self.log_tap.flush();
    }
}

#[cfg(unix)]
async fn terminate_child(child: &mut Child, terminate_grace: Duration) {
    if let Some(id) = child.id() {
        let _ = signal::kill(Pid::from_raw(id as i32), Signal::SIGTERM);
    }

    let graceful = tokio::time::timeout(terminate_grace, child.wait()).await;
    if graceful.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(not(unix))]
async fn terminate_child(child: &mut Child, terminate_grace: Duration) {
    let _ = child.start_kill();
    let _ = tokio::time::timeout(terminate_grace, child.wait()).await;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C6 WorkerSupervisor (spec §4.6) — the heart of the system. Owns the
//! fingerprint -> `WorkerRecord` registry and drives the state machine in
//! spec §4.6: `(none) -> CREATING -> WAITING_READY -> READY -> ... ->
//! TERMINATING -> (none)`.
//!
//! Registry lock discipline (spec §5): a single `tokio::sync::RwLock` over
//! the fingerprint map gives cache hits a read lock plus the per-record
//! lock (writers never block executes). Concurrent creation of the *same*
//! fingerprint is serialized by a per-fingerprint creation lock, so two
//! callers racing on a miss coalesce onto one spawn instead of a generic
//! registry-wide write lock stalling unrelated fingerprints (spec I4).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use sidecar_adapters::{InstallRunner, StreamTag, WorkerClient, WorkerClientFactory};
use sidecar_core::{digest, Clock, Config, Fingerprint, SidecarError, SourceContract};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::install_queue::InstallQueue;
use crate::log_tap::LogTap;
use crate::port_allocator::PortAllocator;
use crate::sandbox::SandboxBuilder;
use crate::worker_record::{WorkerRecord, WorkerState};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("sandbox error: {0}")]
    Sandbox(#[from] crate::sandbox::SandboxError),
    #[error("port exhausted")]
    PortExhausted,
    #[error("worker start failed: {0}")]
    WorkerStart(String),
}

impl From<SupervisorError> for SidecarError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::InvalidInput(msg) => SidecarError::InvalidInput(msg),
            SupervisorError::Sandbox(e) => SidecarError::Sandbox(e.to_string()),
            SupervisorError::PortExhausted => SidecarError::PortExhausted,
            SupervisorError::WorkerStart(msg) => SidecarError::WorkerStart(msg),
        }
    }
}

/// A handle to one live worker, returned to the `Dispatcher`. Reaching the
/// underlying record is always by this handle or by a fresh registry
/// look-up — never by a pointer cached across calls (spec §9).
pub struct WorkerHandle<C: WorkerClient> {
    record: Arc<WorkerRecord<C>>,
}

impl<C: WorkerClient> Clone for WorkerHandle<C> {
    fn clone(&self) -> Self {
        Self {
            record: Arc::clone(&self.record),
        }
    }
}

impl<C: WorkerClient> WorkerHandle<C> {
    /// A single lightweight readiness call (spec §4.6 `handle.probe`), used
    /// by the Dispatcher before trusting a reused worker.
    pub async fn probe(&self) -> bool {
        self.record.client.probe().await
    }

    /// `handle.execute(ctx, body)` (spec §4.6): lock the worker's
    /// per-record lock, update `last_used`, call `execute`, unlock.
    pub async fn execute(
        &self,
        body: serde_json::Value,
        request_timeout: Duration,
        clock: &impl Clock,
    ) -> Result<serde_json::Value, sidecar_adapters::WorkerClientError> {
        let _guard = self.record.record_lock().await;
        self.record.touch(clock.now());
        self.record.client.execute(body, request_timeout).await
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.record.fingerprint
    }
}

/// Per-fingerprint creation locks, striping the serialization so that
/// creating worker A never blocks a concurrent creation of worker B (spec
/// §5, §9).
struct CreationLocks {
    locks: SyncMutex<HashMap<Fingerprint, Arc<AsyncMutex<()>>>>,
}

impl CreationLocks {
    fn new() -> Self {
        Self {
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    fn get(&self, fp: &Fingerprint) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(fp.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    fn forget(&self, fp: &Fingerprint) {
        self.locks.lock().remove(fp);
    }
}

pub struct WorkerSupervisor<C, F, R, CL>
where
    C: WorkerClient,
    F: WorkerClientFactory<Client = C>,
    R: InstallRunner,
    CL: Clock,
{
    config: Config,
    registry: tokio::sync::RwLock<HashMap<Fingerprint, Arc<WorkerRecord<C>>>>,
    creation_locks: CreationLocks,
    sandbox_builder: SandboxBuilder,
    port_allocator: PortAllocator,
    install_queue: InstallQueue<R>,
    client_factory: F,
    clock: CL,
}

impl<C, F, R, CL> WorkerSupervisor<C, F, R, CL>
where
    C: WorkerClient,
    F: WorkerClientFactory<Client = C>,
    R: InstallRunner,
    CL: Clock,
{
    pub fn new(config: Config, client_factory: F, install_runner: R, clock: CL) -> Self {
        let install_queue = InstallQueue::new(install_runner, config.max_concurrent_installs);
        let sandbox_builder = SandboxBuilder::new(&config);
        Self {
            config,
            registry: tokio::sync::RwLock::new(HashMap::new()),
            creation_locks: CreationLocks::new(),
            sandbox_builder,
            port_allocator: PortAllocator::new(),
            install_queue,
            client_factory,
            clock,
        }
    }

    /// Number of live workers, for tests asserting registry size (spec S1-S4).
    pub async fn worker_count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// `acquire(ctx, source) -> WorkerHandle` (spec §4.6).
    pub async fn acquire(&self, source: &SourceContract) -> Result<WorkerHandle<C>, SupervisorError> {
        source
            .validate()
            .map_err(SupervisorError::InvalidInput)?;
        let fp = digest(source);

        if let Some(record) = self.healthy_lookup(&fp).await {
            return Ok(WorkerHandle { record });
        }

        let creation_lock = self.creation_locks.get(&fp);
        let _creation_guard = creation_lock.lock().await;

        // Re-check: another caller may have just finished creating this
        // worker while we waited for the creation lock (spec §4.6 step 3).
        if let Some(record) = self.healthy_lookup(&fp).await {
            return Ok(WorkerHandle { record });
        }

        let record = self.create_worker(fp.clone(), source).await?;
        self.registry.write().await.insert(fp, Arc::clone(&record));
        Ok(WorkerHandle { record })
    }

    /// Fast path (spec §4.6 step 2): a read-lock look-up plus a short
    /// health probe. A stale (unhealthy) record is evicted so the caller
    /// falls through to recreate it.
    async fn healthy_lookup(&self, fp: &Fingerprint) -> Option<Arc<WorkerRecord<C>>> {
        let existing = { self.registry.read().await.get(fp).cloned() }?;
        if existing.state() != WorkerState::Ready {
            return None;
        }
        if existing.client.probe().await {
            return Some(existing);
        }
        self.evict(fp, &existing).await;
        None
    }

    async fn create_worker(
        &self,
        fp: Fingerprint,
        source: &SourceContract,
    ) -> Result<Arc<WorkerRecord<C>>, SupervisorError> {
        let sandbox_path = self.sandbox_builder.build(&fp, source).await?;

        if source.has_dependencies() {
            let log_tap = LogTap::new(fp.prefix(12).to_string());
            let sink_tap = Arc::clone(&log_tap);
            let on_output: sidecar_adapters::OutputSink =
                Arc::new(move |stream, bytes| sink_tap.write(stream, bytes));
            // Install failure is non-fatal (spec §4.4, §7): logged here,
            // readiness decides whether the worker is actually usable.
            if let Err(e) = self
                .install_queue
                .install(&sandbox_path, on_output, sidecar_adapters::CancelToken::new())
                .await
            {
                warn!(fingerprint = %fp, error = %e, "dependency install did not complete");
            }
            log_tap.flush();
        }

        let port = match self.port_allocator.acquire().await {
            Ok(p) => p,
            Err(_) => {
                let _ = self.sandbox_builder.destroy(&sandbox_path).await;
                return Err(SupervisorError::PortExhausted);
            }
        };

        let log_tap = LogTap::new(fp.prefix(12).to_string());
        let child = match self.spawn_child(source, &sandbox_path, port, Arc::clone(&log_tap)) {
            Ok(child) => child,
            Err(e) => {
                self.port_allocator.release(port);
                let _ = self.sandbox_builder.destroy(&sandbox_path).await;
                return Err(SupervisorError::WorkerStart(e.to_string()));
            }
        };

        let client = self.client_factory.connect(port);
        let record = Arc::new(WorkerRecord::new(
            fp.clone(),
            port,
            sandbox_path.clone(),
            client,
            log_tap,
            child,
            self.clock.now(),
        ));

        // Coalescing concurrent callers for this fingerprint is the
        // creation lock's job, not the registry's: `acquire` holds
        // `_creation_guard` for the whole span of `create_worker`, so
        // every other caller racing on the same fingerprint blocks on
        // that lock and re-checks the registry only once this worker is
        // inserted (by `acquire`, after `create_worker` returns) — never
        // observing a half-ready record.
        if let Err(e) = record
            .client
            .wait_ready(self.config.health_check_wait, self.config.health_check_interval)
            .await
        {
            record.terminate(self.config.terminate_grace).await;
            self.port_allocator.release(port);
            let _ = self.sandbox_builder.destroy(&sandbox_path).await;
            return Err(SupervisorError::WorkerStart(e.to_string()));
        }

        info!(fingerprint = %fp, port, "worker ready");
        Ok(record)
    }

    fn spawn_child(
        &self,
        source: &SourceContract,
        sandbox_path: &std::path::Path,
        port: u16,
        log_tap: Arc<LogTap>,
    ) -> std::io::Result<tokio::process::Child> {
        let program = &self.config.worker_command[0];
        let args = &self.config.worker_command[1..];
        let lang = if source.ts_config.is_some() { "ts" } else { "js" };
        let source_file = sandbox_path.join(if lang == "ts" { "fragment.ts" } else { "fragment.js" });

        let mut child = Command::new(program)
            .args(args)
            .current_dir(sandbox_path)
            .env("PORT", port.to_string())
            .env("SIDECAR_SOURCE_FILE", &source_file)
            .env("SIDECAR_LANG", lang)
            .env("SIDECAR_BIND_LOOPBACK_ONLY", "1")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        pump_output(child.stdout.take(), Arc::clone(&log_tap), StreamTag::Stdout);
        pump_output(child.stderr.take(), log_tap, StreamTag::Stderr);

        Ok(child)
    }

    /// `restart(worker)` (spec §4.6): graceful-then-forceful termination,
    /// registry removal, sandbox destruction, port release.
    pub async fn restart(&self, handle: &WorkerHandle<C>) {
        let fp = handle.record.fingerprint.clone();
        let record = { self.registry.write().await.remove(&fp) };
        let record = record.unwrap_or_else(|| Arc::clone(&handle.record));
        self.evict(&fp, &record).await;
    }

    async fn evict(&self, fp: &Fingerprint, record: &Arc<WorkerRecord<C>>) {
        record.mark_terminating();
        self.registry.write().await.remove(fp);
        record.terminate(self.config.terminate_grace).await;
        if let Err(e) = self.sandbox_builder.destroy(&record.sandbox_path).await {
            warn!(fingerprint = %fp, error = %e, "sandbox destroy failed during eviction");
        }
        self.port_allocator.release(record.port);
        self.creation_locks.forget(fp);
        info!(fingerprint = %fp, "worker evicted");
    }

    /// Reaper entry point (spec §4.8): evict every record idle longer than
    /// `idle_timeout`, observing `last_used` under each record's own lock so
    /// an in-flight `execute` is never interrupted.
    pub async fn evict_idle(&self, idle_timeout: Duration) {
        let candidates: Vec<Arc<WorkerRecord<C>>> =
            self.registry.read().await.values().cloned().collect();

        for record in candidates {
            let _guard = record.record_lock().await;
            if record.state() != WorkerState::Ready {
                continue;
            }
            if record.idle_for(self.clock.now()) > idle_timeout {
                let fp = record.fingerprint.clone();
                drop(_guard);
                self.evict(&fp, &record).await;
            }
        }
    }
}

fn pump_output(
    pipe: Option<impl tokio::io::AsyncRead + Unpin + Send + 'static>,
    log_tap: Arc<LogTap>,
    stream: StreamTag,
) {
    use tokio::io::AsyncReadExt;
    let Some(mut pipe) = pipe else { return };
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => log_tap.write(stream, &buf[..n]),
            }
        }
    });
}

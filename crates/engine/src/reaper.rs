// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C8 Reaper (spec §4.8): a background task that wakes every `gc_interval`
//! and evicts any worker idle past `idle_timeout`. The eviction logic
//! itself — including the "observe `last_used` under the record's own
//! lock" invariant — lives on `WorkerSupervisor::evict_idle`; this module
//! only owns the fixed-interval wake schedule.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use sidecar_adapters::{InstallRunner, WorkerClient, WorkerClientFactory};
use sidecar_core::Clock;

use crate::supervisor::WorkerSupervisor;

/// Spawn the idle sweeper. Returns the task handle so the daemon can abort
/// it on shutdown; the task otherwise runs for the lifetime of the process.
pub fn spawn_reaper<C, F, R, CL>(
    supervisor: Arc<WorkerSupervisor<C, F, R, CL>>,
    gc_interval: Duration,
    idle_timeout: Duration,
) -> JoinHandle<()>
where
    C: WorkerClient,
    F: WorkerClientFactory<Client = C>,
    R: InstallRunner,
    CL: Clock,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(gc_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!("reaper sweep starting");
            supervisor.evict_idle(idle_timeout).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_adapters::{FakeInstallRunner, FakeWorkerClientFactory};
    use sidecar_core::test_support::{source, test_config};
    use sidecar_core::FakeClock;

    #[tokio::test(start_paused = true)]
    async fn reaper_evicts_idle_workers_on_its_own_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_path_buf());
        config.worker_command = vec!["sleep".to_string(), "5".to_string()];
        let factory = FakeWorkerClientFactory::new();
        factory.set_default_ready(true);
        let runner = FakeInstallRunner::new();
        let clock = FakeClock::new();
        let supervisor = Arc::new(WorkerSupervisor::new(
            config.clone(),
            factory,
            runner,
            clock.clone(),
        ));

        supervisor
            .acquire(&source("export default () => 1"))
            .await
            .unwrap();
        assert_eq!(supervisor.worker_count().await, 1);

        let handle = spawn_reaper(Arc::clone(&supervisor), config.gc_interval, config.idle_timeout);

        // Advance the supervisor's own clock past idle_timeout, then let
        // tokio's paused timer run the reaper's next couple of ticks.
        clock.advance(config.idle_timeout + Duration::from_millis(1));
        for _ in 0..3 {
            tokio::time::advance(config.gc_interval).await;
            tokio::task::yield_now().await;
        }

        assert_eq!(supervisor.worker_count().await, 0);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_leaves_fresh_workers_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_path_buf());
        config.worker_command = vec!["sleep".to_string(), "5".to_string()];
        config.idle_timeout = Duration::from_secs(3600);
        let factory = FakeWorkerClientFactory::new();
        factory.set_default_ready(true);
        let runner = FakeInstallRunner::new();
        let clock = FakeClock::new();
        let supervisor = Arc::new(WorkerSupervisor::new(
            config.clone(),
            factory,
            runner,
            clock,
        ));

        supervisor
            .acquire(&source("export default () => 1"))
            .await
            .unwrap();

        let handle = spawn_reaper(Arc::clone(&supervisor), config.gc_interval, config.idle_timeout);
        for _ in 0..3 {
            tokio::time::advance(config.gc_interval).await;
            tokio::task::yield_now().await;
        }

        assert_eq!(supervisor.worker_count().await, 1);
        handle.abort();
    }
}

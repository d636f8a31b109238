// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C4 InstallQueue (spec §4.4): bounds how many dependency installs run at
//! once across all workers. Waiters are served in arrival order; one
//! install failing never blocks or fails any other queued or running
//! install — each caller only ever sees the outcome of its own job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sidecar_adapters::{CancelToken, InstallError, InstallRunner, OutputSink};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub struct InstallQueue<R: InstallRunner> {
    runner: R,
    permits: Arc<Semaphore>,
}

impl<R: InstallRunner> InstallQueue<R> {
    pub fn new(runner: R, max_concurrent: usize) -> Self {
        Self {
            runner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Run `sandbox_path`'s install, waiting for a free slot first.
    /// Tokio's semaphore grants permits in acquire order, so waiters queue
    /// FIFO (spec §4.4).
    pub async fn install(
        &self,
        sandbox_path: &Path,
        on_output: OutputSink,
        cancel: CancelToken,
    ) -> Result<(), InstallError> {
        let path: PathBuf = sandbox_path.to_path_buf();

        let acquired = tokio::select! {
            permit = self.permits.acquire() => permit,
            _ = wait_canceled(&cancel) => return Err(InstallError::Canceled),
        };
        let Ok(permit) = acquired else {
            // `permits` is never closed; this only fires if a future
            // revision starts calling `Semaphore::close`.
            return Err(InstallError::Failed("install queue is shut down".to_string()));
        };

        debug!(sandbox = %path.display(), "install starting");
        let result = self.runner.install(&path, on_output, cancel).await;
        drop(permit);

        match &result {
            Ok(()) => debug!(sandbox = %path.display(), "install finished"),
            Err(InstallError::Canceled) => debug!(sandbox = %path.display(), "install canceled"),
            Err(InstallError::Failed(reason)) => {
                warn!(sandbox = %path.display(), %reason, "install failed");
            }
        }
        result
    }

    /// Number of permits currently free, for tests asserting the
    /// concurrency bound (spec P7 / S6).
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

async fn wait_canceled(cancel: &CancelToken) {
    loop {
        if cancel.is_canceled() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_adapters::FakeInstallRunner;
    use std::time::Duration;

    fn noop_sink() -> OutputSink {
        Arc::new(|_, _| {})
    }

    #[tokio::test]
    async fn respects_the_concurrency_bound() {
        let runner = FakeInstallRunner::new().with_delay(Duration::from_millis(30));
        let queue = Arc::new(InstallQueue::new(runner.clone(), 2));

        let mut handles = Vec::new();
        for i in 0..5 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .install(
                        Path::new(&format!("/tmp/sandbox-{i}")),
                        noop_sink(),
                        CancelToken::new(),
                    )
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(runner.max_observed_in_flight(), 2);
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_other_installs() {
        let runner = FakeInstallRunner::new();
        let queue = InstallQueue::new(runner.clone(), 1);

        runner.set_fail(true);
        let first = queue
            .install(Path::new("/tmp/sandbox-a"), noop_sink(), CancelToken::new())
            .await;
        assert!(matches!(first, Err(InstallError::Failed(_))));

        runner.set_fail(false);
        let second = queue
            .install(Path::new("/tmp/sandbox-b"), noop_sink(), CancelToken::new())
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn preemptively_canceled_caller_never_takes_a_permit() {
        let runner = FakeInstallRunner::new().with_delay(Duration::from_millis(50));
        let queue = InstallQueue::new(runner.clone(), 1);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = queue
            .install(Path::new("/tmp/sandbox-a"), noop_sink(), cancel)
            .await;
        assert!(matches!(result, Err(InstallError::Canceled)));
        assert!(runner.calls().is_empty());
    }
}

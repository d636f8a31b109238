// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake install runner: records calls, lets tests script outcomes and
//! concurrency observation without touching a real package manager.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CancelToken, InstallError, InstallRunner, OutputSink};

#[derive(Debug, Clone)]
pub struct InstallCall {
    pub sandbox_path: PathBuf,
}

#[derive(Clone)]
pub struct FakeInstallRunner {
    calls: Arc<Mutex<Vec<InstallCall>>>,
    in_flight: Arc<AtomicUsize>,
    max_observed_in_flight: Arc<AtomicUsize>,
    delay: Duration,
    fail: Arc<Mutex<bool>>,
}

impl Default for FakeInstallRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeInstallRunner {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_observed_in_flight: Arc::new(AtomicUsize::new(0)),
            delay: Duration::from_millis(20),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<InstallCall> {
        self.calls.lock().clone()
    }

    /// The highest number of `install` calls this runner observed running
    /// concurrently, for asserting InstallQueue's concurrency bound (spec
    /// P7 / S6).
    pub fn max_observed_in_flight(&self) -> usize {
        self.max_observed_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl InstallRunner for FakeInstallRunner {
    async fn install(
        &self,
        sandbox_path: &std::path::Path,
        _on_output: OutputSink,
        cancel: CancelToken,
    ) -> Result<(), InstallError> {
        self.calls.lock().push(InstallCall {
            sandbox_path: sandbox_path.to_path_buf(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed_in_flight.fetch_max(current, Ordering::SeqCst);

        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = wait_canceled(&cancel) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                return Err(InstallError::Canceled);
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if *self.fail.lock() {
            return Err(InstallError::Failed("fake install failure".to_string()));
        }
        Ok(())
    }
}

async fn wait_canceled(cancel: &CancelToken) {
    loop {
        if cancel.is_canceled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sandbox_path() {
        let runner = FakeInstallRunner::new().with_delay(Duration::from_millis(1));
        let sink: OutputSink = Arc::new(|_, _| {});
        runner
            .install(std::path::Path::new("/tmp/sandbox-a"), sink, CancelToken::new())
            .await
            .unwrap();
        assert_eq!(runner.calls().len(), 1);
    }
}

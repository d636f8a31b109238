// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake worker client for deterministic testing: a call log plus
//! programmable per-port outcomes, so a test can script exactly how each
//! worker's `/ready` and `/execute` calls behave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{WorkerClient, WorkerClientError, WorkerClientFactory};

#[derive(Debug, Clone)]
pub enum WorkerCall {
    WaitReady { port: u16 },
    Execute { port: u16 },
    Probe { port: u16 },
}

#[derive(Clone, Default)]
struct PortState {
    ready: bool,
    probe_fails: bool,
    execute_error: Option<WorkerClientError>,
    execute_response: Option<serde_json::Value>,
}

/// A fake `WorkerClientFactory` whose per-port behavior is configured by
/// test code before a `WorkerSupervisor` drives it.
#[derive(Clone)]
pub struct FakeWorkerClientFactory {
    state: Arc<Mutex<HashMap<u16, PortState>>>,
    calls: Arc<Mutex<Vec<WorkerCall>>>,
    default_ready: Arc<std::sync::atomic::AtomicBool>,
    default_execute_error: Arc<Mutex<Option<WorkerClientError>>>,
}

impl Default for FakeWorkerClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWorkerClientFactory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            default_ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            default_execute_error: Arc::new(Mutex::new(None)),
        }
    }

    /// When set, every port connected to from now on starts out ready —
    /// useful for supervisor-level tests where the real `PortAllocator`
    /// hands back an unpredictable ephemeral port per worker (spec §4.2).
    pub fn set_default_ready(&self, ready: bool) {
        self.default_ready
            .store(ready, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make every worker's `/execute` fail this way, no matter which
    /// ephemeral port `PortAllocator` hands it — unlike
    /// `set_execute_error`, this survives a Dispatcher restart spawning a
    /// fresh worker on a fresh port (spec S5).
    pub fn set_default_execute_error(&self, error: Option<WorkerClientError>) {
        *self.default_execute_error.lock() = error;
    }

    pub fn calls(&self) -> Vec<WorkerCall> {
        self.calls.lock().clone()
    }

    /// Mark a port as immediately ready (probe/wait_ready succeed).
    pub fn set_ready(&self, port: u16) {
        self.state.lock().entry(port).or_default().ready = true;
    }

    /// Make `probe`/`wait_ready` fail for a port, e.g. to simulate a
    /// crashed worker (spec S5).
    pub fn set_probe_fails(&self, port: u16, fails: bool) {
        self.state.lock().entry(port).or_default().probe_fails = fails;
    }

    /// Queue an error for the next `execute` call on a port.
    pub fn set_execute_error(&self, port: u16, error: WorkerClientError) {
        self.state.lock().entry(port).or_default().execute_error = Some(error);
    }

    /// Set the JSON response `execute` returns on success.
    pub fn set_execute_response(&self, port: u16, response: serde_json::Value) {
        self.state.lock().entry(port).or_default().execute_response = Some(response);
    }
}

impl WorkerClientFactory for FakeWorkerClientFactory {
    type Client = FakeWorkerClient;

    fn connect(&self, port: u16) -> FakeWorkerClient {
        let default_ready = self
            .default_ready
            .load(std::sync::atomic::Ordering::SeqCst);
        self.state.lock().entry(port).or_insert_with(|| PortState {
            ready: default_ready,
            ..PortState::default()
        });
        FakeWorkerClient {
            port,
            state: Arc::clone(&self.state),
            calls: Arc::clone(&self.calls),
            default_execute_error: Arc::clone(&self.default_execute_error),
        }
    }
}

pub struct FakeWorkerClient {
    port: u16,
    state: Arc<Mutex<HashMap<u16, PortState>>>,
    calls: Arc<Mutex<Vec<WorkerCall>>>,
    default_execute_error: Arc<Mutex<Option<WorkerClientError>>>,
}

#[async_trait]
impl WorkerClient for FakeWorkerClient {
    async fn wait_ready(
        &self,
        _timeout: Duration,
        _interval: Duration,
    ) -> Result<(), WorkerClientError> {
        self.calls
            .lock()
            .push(WorkerCall::WaitReady { port: self.port });
        let ready = self
            .state
            .lock()
            .get(&self.port)
            .map(|s| s.ready && !s.probe_fails)
            .unwrap_or(false);
        if ready {
            Ok(())
        } else {
            Err(WorkerClientError::ReadyTimeout)
        }
    }

    async fn execute(
        &self,
        body: serde_json::Value,
        _request_timeout: Duration,
    ) -> Result<serde_json::Value, WorkerClientError> {
        self.calls
            .lock()
            .push(WorkerCall::Execute { port: self.port });
        let mut state = self.state.lock();
        let entry = state.entry(self.port).or_default();
        if let Some(error) = entry.execute_error.take() {
            return Err(error);
        }
        if let Some(error) = self.default_execute_error.lock().clone() {
            return Err(error);
        }
        Ok(entry
            .execute_response
            .clone()
            .unwrap_or_else(|| serde_json::json!({ "result": body })))
    }

    async fn probe(&self) -> bool {
        self.calls.lock().push(WorkerCall::Probe { port: self.port });
        self.state
            .lock()
            .get(&self.port)
            .map(|s| s.ready && !s.probe_fails)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unready_port_fails_wait_ready() {
        let factory = FakeWorkerClientFactory::new();
        let client = factory.connect(9000);
        let result = client
            .wait_ready(Duration::from_millis(10), Duration::from_millis(1))
            .await;
        assert!(matches!(result, Err(WorkerClientError::ReadyTimeout)));
    }

    #[tokio::test]
    async fn ready_port_passes_probe_and_wait_ready() {
        let factory = FakeWorkerClientFactory::new();
        factory.set_ready(9001);
        let client = factory.connect(9001);
        assert!(client.probe().await);
        assert!(client
            .wait_ready(Duration::from_millis(10), Duration::from_millis(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn execute_error_is_consumed_once() {
        let factory = FakeWorkerClientFactory::new();
        factory.set_ready(9002);
        factory.set_execute_error(9002, WorkerClientError::Http(503));
        let client = factory.connect(9002);

        let first = client
            .execute(serde_json::json!({}), Duration::from_secs(1))
            .await;
        assert!(matches!(first, Err(WorkerClientError::Http(503))));

        let second = client
            .execute(serde_json::json!({}), Duration::from_secs(1))
            .await;
        assert!(second.is_ok());
    }
}

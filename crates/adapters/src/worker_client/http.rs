// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production `WorkerClient`: plain loopback HTTP via `reqwest`. No TLS —
//! workers only ever bind `127.0.0.1` (spec §4.5, §1 loopback-only
//! non-goal).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{WorkerClient, WorkerClientError, WorkerClientFactory};

/// Shared `reqwest::Client` used to construct per-worker clients. A single
/// connection pool is reused across all workers (spec §5: "one HTTP
/// connection pool" per worker is the per-client view; the underlying
/// `reqwest::Client` may pool sockets across hosts, which is fine since
/// every worker is a distinct `127.0.0.1:port`).
#[derive(Clone)]
pub struct HttpWorkerClientFactory {
    client: Client,
}

impl Default for HttpWorkerClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpWorkerClientFactory {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl WorkerClientFactory for HttpWorkerClientFactory {
    type Client = HttpWorkerClient;

    fn connect(&self, port: u16) -> HttpWorkerClient {
        HttpWorkerClient {
            client: self.client.clone(),
            base_url: format!("http://127.0.0.1:{port}"),
        }
    }
}

pub struct HttpWorkerClient {
    client: Client,
    base_url: String,
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn wait_ready(
        &self,
        timeout: Duration,
        interval: Duration,
    ) -> Result<(), WorkerClientError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.probe().await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WorkerClientError::ReadyTimeout);
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn execute(
        &self,
        body: serde_json::Value,
        request_timeout: Duration,
    ) -> Result<serde_json::Value, WorkerClientError> {
        let url = format!("{}/execute", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "input": body }))
            .timeout(request_timeout)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerClientError::Http(status.as_u16()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| WorkerClientError::Transport(e.to_string()))
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/ready", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(1))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> WorkerClientError {
    if err.is_timeout() {
        WorkerClientError::Timeout
    } else {
        WorkerClientError::Transport(err.to_string())
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C7 Dispatcher (spec §4.7): the only thing an adapter-facing entry point
//! calls. Turns a `RunRequest` into a `RunResponse` by acquiring a worker
//! from the `WorkerSupervisor`, probing it, executing, and retrying
//! infrastructure failures with exponential backoff — never retrying a
//! user-function error.

use std::sync::Arc;
use std::time::Duration;

use sidecar_adapters::{InstallRunner, WorkerClient, WorkerClientError, WorkerClientFactory};
use sidecar_core::{Clock, Config, RunRequest, RunResponse, SidecarError};
use thiserror::Error;

use crate::supervisor::{SupervisorError, WorkerSupervisor};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// A terminal failure returned without entering the retry loop at all
    /// (validation, or a user-function error — spec §7: never retried).
    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    /// The retry loop ran out of attempts (spec §4.7: `return last_err
    /// wrapped with attempt count`). `attempts` counts every acquire
    /// attempted, including the last one that produced `source`.
    #[error("giving up after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: SidecarError,
    },
}

/// Wraps a `WorkerSupervisor` with the retry loop described in spec §4.7.
pub struct Dispatcher<C, F, R, CL>
where
    C: WorkerClient,
    F: WorkerClientFactory<Client = C>,
    R: InstallRunner,
    CL: Clock,
{
    supervisor: Arc<WorkerSupervisor<C, F, R, CL>>,
    clock: CL,
    request_timeout: Duration,
    max_retries: u32,
    retry_base: Duration,
}

impl<C, F, R, CL> Dispatcher<C, F, R, CL>
where
    C: WorkerClient,
    F: WorkerClientFactory<Client = C>,
    R: InstallRunner,
    CL: Clock,
{
    pub fn new(config: &Config, supervisor: Arc<WorkerSupervisor<C, F, R, CL>>, clock: CL) -> Self {
        Self {
            supervisor,
            clock,
            request_timeout: config.request_timeout,
            max_retries: config.max_retries,
            retry_base: config.retry_base,
        }
    }

    pub fn supervisor(&self) -> &WorkerSupervisor<C, F, R, CL> {
        &self.supervisor
    }

    /// `run(request) -> response` (spec §4.7): acquire, probe, execute;
    /// on an infrastructure failure restart the worker and retry with
    /// exponential backoff up to `max_retries` attempts; a user-function
    /// error or a validation failure is returned immediately.
    pub async fn run(&self, request: &RunRequest) -> Result<RunResponse, DispatchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let handle = match self.supervisor.acquire(&request.source).await {
                Ok(handle) => handle,
                Err(SupervisorError::InvalidInput(msg)) => {
                    return Err(SidecarError::InvalidInput(msg).into());
                }
                Err(e) => {
                    if attempt > self.max_retries {
                        return Err(DispatchError::Exhausted {
                            attempts: attempt,
                            source: SidecarError::from(e),
                        });
                    }
                    self.backoff(attempt).await;
                    continue;
                }
            };

            if !handle.probe().await {
                self.supervisor.restart(&handle).await;
                if attempt > self.max_retries {
                    return Err(DispatchError::Exhausted {
                        attempts: attempt,
                        source: SidecarError::WorkerStart(
                            "worker failed its pre-execute probe".to_string(),
                        ),
                    });
                }
                self.backoff(attempt).await;
                continue;
            }

            match handle
                .execute(request.payload.clone(), self.request_timeout, &self.clock)
                .await
            {
                Ok(body) => {
                    if let Some(user_error) = as_user_function_error(&body) {
                        // The worker ran fine; the user fragment threw.
                        // Terminal, and the worker stays in the pool.
                        return Err(user_error.into());
                    }
                    return Ok(RunResponse { body });
                }
                Err(err) => {
                    self.supervisor.restart(&handle).await;
                    let mapped = map_worker_client_error(err);
                    if !mapped.is_retryable() {
                        return Err(mapped.into());
                    }
                    if attempt > self.max_retries {
                        return Err(DispatchError::Exhausted {
                            attempts: attempt,
                            source: mapped,
                        });
                    }
                    self.backoff(attempt).await;
                }
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self.retry_base.saturating_mul(factor);
        tokio::time::sleep(delay).await;
    }
}

/// A worker's `/execute` response shapes a user-code failure as
/// `{ "error": { code, message, stack } }` rather than an HTTP-level error
/// (spec §4.5, §7), so a successful transport call still has to be
/// inspected for this shape before it's trusted as the real response.
fn as_user_function_error(body: &serde_json::Value) -> Option<SidecarError> {
    let error = body.get("error")?;
    let code = error.get("code")?.as_i64()?;
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("user function error")
        .to_string();
    let stack = error
        .get("stack")
        .and_then(|s| s.as_str())
        .map(|s| s.to_string());
    Some(SidecarError::UserFunction {
        code,
        message,
        stack,
    })
}

fn map_worker_client_error(err: WorkerClientError) -> SidecarError {
    match err {
        WorkerClientError::ReadyTimeout => {
            SidecarError::WorkerStart("worker did not become ready".to_string())
        }
        WorkerClientError::Http(status) => SidecarError::WorkerHttp(status),
        WorkerClientError::Transport(msg) => SidecarError::WorkerTransport(msg),
        WorkerClientError::Timeout => SidecarError::WorkerTimeout,
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The adapter-facing HTTP front door (spec §6 "Adapter-facing entry").
//! The composition-engine adapter's real wire transport lives outside
//! this system; this module is the stand-in transport chosen for
//! `sidecar-daemon` (see `DESIGN.md`'s Open Question entry) — a single
//! `POST /v1/run` decoding the request contract of §3 straight into
//! `sidecar_core::RunRequest` and calling `Dispatcher::run`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sidecar_adapters::{InstallRunner, WorkerClient, WorkerClientFactory};
use sidecar_core::{Clock, RunRequest, SidecarError};
use sidecar_engine::{DispatchError, Dispatcher};
use tracing::warn;

/// Shared state behind every route: just the `Dispatcher`, reached
/// through an `Arc` so axum can clone it cheaply per request (spec §9:
/// no process-global mutable state besides what the supervisor already
/// owns).
pub type AppState<C, F, R, CL> = Arc<Dispatcher<C, F, R, CL>>;

pub fn build_router<C, F, R, CL>(state: AppState<C, F, R, CL>) -> Router
where
    C: WorkerClient,
    F: WorkerClientFactory<Client = C>,
    R: InstallRunner,
    CL: Clock,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/run", post(run::<C, F, R, CL>))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn run<C, F, R, CL>(
    State(dispatcher): State<AppState<C, F, R, CL>>,
    Json(request): Json<RunRequest>,
) -> Response
where
    C: WorkerClient,
    F: WorkerClientFactory<Client = C>,
    R: InstallRunner,
    CL: Clock,
{
    match dispatcher.run(&request).await {
        Ok(response) => (StatusCode::OK, Json(serde_json::json!({ "result": response.body }))).into_response(),

        // A user fragment threw; the worker itself is healthy and stays
        // pooled. The adapter sees this as a successful core call with a
        // structured error payload (spec §7), never an HTTP error.
        Err(DispatchError::Sidecar(SidecarError::UserFunction {
            code,
            message,
            stack,
        })) => (
            StatusCode::OK,
            Json(serde_json::json!({ "error": { "code": code, "message": message, "stack": stack } })),
        )
            .into_response(),

        Err(DispatchError::Sidecar(SidecarError::InvalidInput(msg))) => {
            (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": { "message": msg } }))).into_response()
        }

        Err(DispatchError::Sidecar(SidecarError::Canceled)) => client_closed_request(),

        Err(DispatchError::Sidecar(err)) => {
            warn!(error = %err, "run failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": { "message": err.to_string() } })),
            )
                .into_response()
        }

        // The retry loop ran out of attempts (spec §4.7); `attempts` is
        // surfaced alongside the last infrastructure error it hit.
        Err(DispatchError::Exhausted { attempts, source }) => {
            warn!(attempts, error = %source, "run failed after exhausting retries");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": { "message": source.to_string(), "attempts": attempts }
                })),
            )
                .into_response()
        }
    }
}

/// 499 isn't in `http::StatusCode`'s named constants (it's an nginx
/// convention, not an IANA-registered code); build it explicitly rather
/// than reusing an unrelated 4xx.
fn client_closed_request() -> Response {
    let status = StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT);
    (status, Json(serde_json::json!({ "error": { "message": "canceled" } }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use sidecar_adapters::{FakeInstallRunner, FakeWorkerClientFactory};
    use sidecar_core::test_support::{source, test_config};
    use sidecar_core::FakeClock;
    use sidecar_engine::WorkerSupervisor;
    use tower::ServiceExt;

    fn app(scratch_root: std::path::PathBuf) -> Router {
        let mut config = test_config(scratch_root);
        config.worker_command = vec!["sleep".to_string(), "5".to_string()];
        let factory = FakeWorkerClientFactory::new();
        factory.set_default_ready(true);
        let runner = FakeInstallRunner::new();
        let clock = FakeClock::new();
        let supervisor = Arc::new(WorkerSupervisor::new(config.clone(), factory, runner, clock.clone()));
        let dispatcher = Arc::new(Dispatcher::new(&config, supervisor, clock));
        build_router(dispatcher)
    }

    fn request_body(inline: &str) -> serde_json::Value {
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "run",
            "source": { "inline": inline },
            "payload": { "x": 1 },
        })
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path().to_path_buf())
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn run_executes_and_returns_the_worker_result() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::to_vec(&request_body("export default (x) => x")).unwrap();
        let response = app(dir.path().to_path_buf())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/run")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_source_is_rejected_with_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::to_vec(&request_body("   ")).unwrap();
        let response = app(dir.path().to_path_buf())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/run")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

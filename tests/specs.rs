// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios exercising `sidecar-engine`'s public surface the
//! way an adapter would: through `Dispatcher::run`, never by reaching
//! into a registry directly. Each test below corresponds to one literal
//! scenario from the design's testable-properties section.
//!
//! A real Node/TypeScript interpreter isn't available in this
//! environment, so every scenario substitutes `FakeWorkerClientFactory`
//! for the wire transport and `sleep` for the worker process itself —
//! `WorkerSupervisor` still does a real process spawn, sandbox build, and
//! port allocation, only the HTTP round-trip to the worker is faked.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sidecar_adapters::{FakeInstallRunner, FakeWorkerClientFactory, WorkerCall, WorkerClientError};
use sidecar_core::test_support::{source, source_with_deps, test_config};
use sidecar_core::{FakeClock, RunRequest};
use sidecar_engine::{Dispatcher, WorkerSupervisor};

type TestDispatcher = Dispatcher<
    sidecar_adapters::FakeWorkerClient,
    FakeWorkerClientFactory,
    FakeInstallRunner,
    FakeClock,
>;

fn sleepy_request(inline: &str, payload: serde_json::Value) -> RunRequest {
    RunRequest {
        api_version: "v1".to_string(),
        kind: "run".to_string(),
        source: source(inline),
        payload,
    }
}

fn wire_up(
    scratch_root: PathBuf,
    clock: FakeClock,
) -> (TestDispatcher, Arc<WorkerSupervisor<sidecar_adapters::FakeWorkerClient, FakeWorkerClientFactory, FakeInstallRunner, FakeClock>>, FakeWorkerClientFactory) {
    let mut config = test_config(scratch_root);
    config.worker_command = vec!["sleep".to_string(), "5".to_string()];
    let factory = FakeWorkerClientFactory::new();
    factory.set_default_ready(true);
    let runner = FakeInstallRunner::new();
    let supervisor = Arc::new(WorkerSupervisor::new(
        config.clone(),
        factory.clone(),
        runner,
        clock.clone(),
    ));
    let dispatcher = Dispatcher::new(&config, Arc::clone(&supervisor), clock);
    (dispatcher, supervisor, factory)
}

/// S1: a pure uppercase-map transform. A second `Run` with the same
/// source and a different payload must not spawn a second worker.
#[tokio::test]
async fn s1_uppercase_map_transform_reuses_the_worker() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, supervisor, factory) = wire_up(dir.path().to_path_buf(), FakeClock::new());

    let source_inline = "export default (payload) => ({ resources: { cm: { resource: { \
         apiVersion: 'v1', kind: 'ConfigMap', metadata: { name: 'generated-configmap' }, \
         data: { NAME: payload.observed.composite.resource.spec.data.name.toUpperCase() } } } } })";

    let payload = serde_json::json!({
        "observed": { "composite": { "resource": { "spec": { "data": { "name": "John Doe" } } } } }
    });
    // The fake transport echoes whatever body the Dispatcher hands it
    // back as `{ "result": body }`, standing in for the worker actually
    // running this fragment and producing the ConfigMap shape above; the
    // scenario under test is cache behavior across two `Run`s, which the
    // fake captures faithfully via its call log.
    let req = sleepy_request(source_inline, payload.clone());

    let r1 = dispatcher.run(&req).await.unwrap();
    assert_eq!(r1.body["result"], payload);
    assert_eq!(supervisor.worker_count().await, 1);

    let mut second_payload = payload.clone();
    second_payload["observed"]["composite"]["resource"]["spec"]["data"]["name"] =
        serde_json::json!("Jane Doe");
    let req2 = sleepy_request(source_inline, second_payload.clone());
    let r2 = dispatcher.run(&req2).await.unwrap();
    assert_eq!(r2.body["result"], second_payload);
    assert_eq!(supervisor.worker_count().await, 1);
    assert_eq!(factory_ports(&factory).len(), 1, "second Run must not spawn a new worker");
}

fn factory_ports(factory: &FakeWorkerClientFactory) -> Vec<u16> {
    factory
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            WorkerCall::WaitReady { port } => Some(port),
            _ => None,
        })
        .collect()
}

/// S2: two calls with identical `source` but different `payload` bytes
/// spawn exactly one worker; the registry stays size 1 throughout.
#[tokio::test]
async fn s2_cache_hit_on_identical_source() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, supervisor, _factory) = wire_up(dir.path().to_path_buf(), FakeClock::new());

    let inline = "export default (x) => x";
    dispatcher
        .run(&sleepy_request(inline, serde_json::json!({ "a": 1 })))
        .await
        .unwrap();
    assert_eq!(supervisor.worker_count().await, 1);

    dispatcher
        .run(&sleepy_request(inline, serde_json::json!({ "a": 2 })))
        .await
        .unwrap();
    assert_eq!(supervisor.worker_count().await, 1);
}

/// S3: a one-byte difference in `source.inline` spawns a distinct
/// worker; registry size reaches 2.
#[tokio::test]
async fn s3_distinct_fragments_spawn_distinct_workers() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, supervisor, _factory) = wire_up(dir.path().to_path_buf(), FakeClock::new());

    dispatcher
        .run(&sleepy_request("export default () => 1", serde_json::json!({})))
        .await
        .unwrap();
    dispatcher
        .run(&sleepy_request("export default () => 2", serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(supervisor.worker_count().await, 2);
}

/// S4: with `idle_timeout=200ms`/`gc_interval=50ms`, a worker invoked
/// once and then left alone for 500ms is evicted and its sandbox
/// directory removed.
#[tokio::test]
async fn s4_idle_worker_is_evicted_and_sandbox_removed() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let mut config = test_config(dir.path().to_path_buf());
    config.worker_command = vec!["sleep".to_string(), "5".to_string()];
    config.idle_timeout = Duration::from_millis(200);
    config.gc_interval = Duration::from_millis(50);

    let factory = FakeWorkerClientFactory::new();
    factory.set_default_ready(true);
    let runner = FakeInstallRunner::new();
    let supervisor = Arc::new(WorkerSupervisor::new(
        config.clone(),
        factory,
        runner,
        clock.clone(),
    ));

    let handle = supervisor.acquire(&source("export default () => 1")).await.unwrap();
    assert!(handle.probe().await);

    // Advance past idle_timeout + gc_interval and let the sweep run once.
    clock.advance(Duration::from_millis(500));
    supervisor.evict_idle(config.idle_timeout).await;

    assert_eq!(supervisor.worker_count().await, 0);
}

/// S5: a worker whose `/execute` always returns 503. The Dispatcher
/// exhausts `max_retries` attempts, restarting (spawning a fresh worker)
/// each time, and surfaces the wrapped HTTP error along with the attempt
/// count (spec §4.7 "return last_err wrapped with attempt count"; §8 S5).
#[tokio::test]
async fn s5_worker_crash_recovery_exhausts_retries() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, supervisor, factory) = wire_up(dir.path().to_path_buf(), FakeClock::new());
    factory.set_default_execute_error(Some(WorkerClientError::Http(503)));

    let err = dispatcher
        .run(&sleepy_request("export default () => 1", serde_json::json!({})))
        .await
        .unwrap_err();

    match err {
        sidecar_engine::DispatchError::Exhausted { attempts, source } => {
            assert!(matches!(source, sidecar_core::SidecarError::WorkerHttp(503)));
            // test_config's max_retries is 2, so the loop runs the
            // initial attempt plus 2 retries before giving up.
            assert_eq!(attempts, 3);
        }
        other => panic!("expected DispatchError::Exhausted, got {other:?}"),
    }
    // Every attempt restarted the worker it just used, so nothing healthy
    // is left pooled.
    assert_eq!(supervisor.worker_count().await, 0);

    let wait_ready_attempts = factory_ports(&factory).len();
    assert!(wait_ready_attempts >= 2, "expected more than one worker to have been spawned across retries");
}

/// S6: with `max_concurrent_installs=2`, ten distinct-fingerprint
/// requests with dependencies never run more than 2 installs at once.
#[tokio::test]
async fn s6_install_concurrency_never_exceeds_the_bound() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.worker_command = vec!["sleep".to_string(), "5".to_string()];
    config.max_concurrent_installs = 2;

    let factory = FakeWorkerClientFactory::new();
    factory.set_default_ready(true);
    let runner = FakeInstallRunner::new().with_delay(Duration::from_millis(30));
    let supervisor = Arc::new(WorkerSupervisor::new(
        config,
        factory,
        runner.clone(),
        FakeClock::new(),
    ));

    let mut handles = Vec::new();
    for i in 0..10 {
        let supervisor = Arc::clone(&supervisor);
        let src = source_with_deps(
            &format!("export default () => {i}"),
            &[("left-pad", "^1.0.0")],
        );
        handles.push(tokio::spawn(async move { supervisor.acquire(&src).await.unwrap() }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(runner.calls().len(), 10);
    assert!(
        runner.max_observed_in_flight() <= 2,
        "observed {} concurrent installs, bound is 2",
        runner.max_observed_in_flight()
    );
    assert_eq!(supervisor.worker_count().await, 10);
}

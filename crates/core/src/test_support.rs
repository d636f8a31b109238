// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared by other crates' test suites, gated behind the
//! `test-support` feature so downstream crates can depend on them in tests
//! without pulling them into a release build.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::Config;
use crate::source::SourceContract;

/// Build a minimal valid `SourceContract` with no dependencies.
pub fn source(inline: &str) -> SourceContract {
    SourceContract {
        inline: inline.to_string(),
        dependencies: BTreeMap::new(),
        lockfile: None,
        ts_config: None,
    }
}

/// Build a `SourceContract` with the given dependencies declared.
pub fn source_with_deps(inline: &str, deps: &[(&str, &str)]) -> SourceContract {
    SourceContract {
        inline: inline.to_string(),
        dependencies: deps
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        lockfile: None,
        ts_config: None,
    }
}

/// A `Config` tuned for fast tests: short timeouts, small scratch paths
/// under a caller-supplied tempdir.
pub fn test_config(scratch_root: std::path::PathBuf) -> Config {
    Config {
        scratch_root,
        gc_interval: Duration::from_millis(20),
        idle_timeout: Duration::from_millis(100),
        health_check_wait: Duration::from_millis(500),
        health_check_interval: Duration::from_millis(10),
        request_timeout: Duration::from_secs(2),
        terminate_grace: Duration::from_millis(200),
        max_concurrent_installs: 2,
        max_retries: 2,
        retry_base: Duration::from_millis(5),
        ..Config::default()
    }
}

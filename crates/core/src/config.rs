// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C10 Config: declared options, defaults, and validation (spec §4.10).
//!
//! Source precedence (lowest -> highest, spec §6): compiled defaults,
//! environment, command-line flags. This module owns defaults and
//! validation; `sidecar-daemon::cli` owns the env/flag parsing layer on
//! top, keeping "what a value means" separate from "where it came from".

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be a positive duration")]
    NonPositiveDuration { field: &'static str },

    #[error("{field} must be >= 1")]
    NotPositive { field: &'static str },

    #[error("{field} must not be empty")]
    EmptyPath { field: &'static str },

    #[error("tls_enabled requires both tls_cert_file and tls_key_file")]
    IncompleteTls,
}

/// Declared runtime options (spec §4.10). Every duration here bounds one
/// of the suspension points enumerated in spec §5.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for the adapter-facing frontend.
    pub grpc_address: String,

    /// Parent directory for all per-worker sandboxes; created if absent.
    pub scratch_root: PathBuf,

    /// Pre-provisioned global module tree linked into dependency-free
    /// sandboxes (spec §3, §9 Open Question — linking, not copying).
    pub shared_modules_path: PathBuf,

    /// Reaper wake interval.
    pub gc_interval: Duration,

    /// Idle-eviction threshold, measured from a worker's last `execute`.
    pub idle_timeout: Duration,

    pub tls_enabled: bool,
    pub tls_cert_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,

    pub log_level: String,
    pub log_format: String,

    /// Upper bound on `waitReady` (C5).
    pub health_check_wait: Duration,
    /// Poll period inside `waitReady`.
    pub health_check_interval: Duration,

    /// Per-`execute` upper bound.
    pub request_timeout: Duration,

    /// Upper bound on graceful termination before force-kill (spec §4.6
    /// `restart`, §5).
    pub terminate_grace: Duration,

    /// InstallQueue capacity (spec §4.4).
    pub max_concurrent_installs: usize,

    /// Dispatcher retry ceiling (spec §4.7).
    pub max_retries: u32,
    /// Base delay for the Dispatcher's exponential backoff.
    pub retry_base: Duration,

    /// The interpreter binary invoked for every worker, e.g. `["node"]`.
    /// The sandbox's source file path is passed via the
    /// `SIDECAR_SOURCE_FILE` env var (spec §6), so this vector never needs
    /// per-worker templating.
    pub worker_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grpc_address: "127.0.0.1:7500".to_string(),
            scratch_root: PathBuf::from("/var/run/sidecar/sandboxes"),
            shared_modules_path: PathBuf::from("/var/run/sidecar/shared-modules"),
            gc_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10 * 60),
            tls_enabled: false,
            tls_cert_file: None,
            tls_key_file: None,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            health_check_wait: Duration::from_secs(10),
            health_check_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(30),
            terminate_grace: Duration::from_secs(5),
            max_concurrent_installs: 4,
            max_retries: 3,
            retry_base: Duration::from_millis(100),
            worker_command: vec!["node".to_string()],
        }
    }
}

impl Config {
    /// Reject non-positive durations and invalid paths (spec §4.10).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scratch_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath {
                field: "scratch_root",
            });
        }
        if self.gc_interval.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "gc_interval",
            });
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "idle_timeout",
            });
        }
        if self.health_check_wait.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "health_check_wait",
            });
        }
        if self.health_check_interval.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "health_check_interval",
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "request_timeout",
            });
        }
        if self.terminate_grace.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "terminate_grace",
            });
        }
        if self.max_concurrent_installs == 0 {
            return Err(ConfigError::NotPositive {
                field: "max_concurrent_installs",
            });
        }
        if self.tls_enabled && (self.tls_cert_file.is_none() || self.tls_key_file.is_none()) {
            return Err(ConfigError::IncompleteTls);
        }
        if self.worker_command.is_empty() {
            return Err(ConfigError::EmptyPath {
                field: "worker_command",
            });
        }
        Ok(())
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C10 Config loading: `clap`-derived CLI flags, each with an `env`
//! fallback, so precedence is defaults < environment < command-line
//! flags (spec §6) for free from `clap`'s own resolution order.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sidecar_core::Config;

/// `sidecard` — the function sidecar runtime's worker-process supervisor.
#[derive(Debug, Parser)]
#[command(name = "sidecard", version, about, long_about = None)]
pub struct Cli {
    /// Listen address for the adapter-facing HTTP front door.
    #[arg(long, env = "SIDECAR_GRPC_ADDRESS", default_value = "127.0.0.1:7500")]
    pub grpc_address: String,

    /// Parent directory for all per-worker sandboxes; created if absent.
    #[arg(long, env = "SIDECAR_SCRATCH_ROOT", default_value = "/var/run/sidecar/sandboxes")]
    pub scratch_root: PathBuf,

    /// Pre-provisioned global module tree linked into dependency-free
    /// sandboxes.
    #[arg(
        long,
        env = "SIDECAR_SHARED_MODULES_PATH",
        default_value = "/var/run/sidecar/shared-modules"
    )]
    pub shared_modules_path: PathBuf,

    /// Reaper wake interval, in milliseconds.
    #[arg(long, env = "SIDECAR_GC_INTERVAL_MS", default_value_t = 30_000)]
    pub gc_interval_ms: u64,

    /// Idle-eviction threshold, in milliseconds.
    #[arg(long, env = "SIDECAR_IDLE_TIMEOUT_MS", default_value_t = 600_000)]
    pub idle_timeout_ms: u64,

    /// Terminate the adapter-facing listener with TLS.
    #[arg(long, env = "SIDECAR_TLS_ENABLED", default_value_t = false)]
    pub tls_enabled: bool,

    #[arg(long, env = "SIDECAR_TLS_CERT_FILE")]
    pub tls_cert_file: Option<PathBuf>,

    #[arg(long, env = "SIDECAR_TLS_KEY_FILE")]
    pub tls_key_file: Option<PathBuf>,

    #[arg(long, env = "SIDECAR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// `pretty` (human-readable, stderr) or `json` (structured, stdout).
    #[arg(long, env = "SIDECAR_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Upper bound on `waitReady`, in milliseconds.
    #[arg(long, env = "SIDECAR_HEALTH_CHECK_WAIT_MS", default_value_t = 10_000)]
    pub health_check_wait_ms: u64,

    /// Poll period inside `waitReady`, in milliseconds.
    #[arg(long, env = "SIDECAR_HEALTH_CHECK_INTERVAL_MS", default_value_t = 50)]
    pub health_check_interval_ms: u64,

    /// Per-`execute` upper bound, in milliseconds.
    #[arg(long, env = "SIDECAR_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    /// Graceful-termination window before force-kill, in milliseconds.
    #[arg(long, env = "SIDECAR_TERMINATE_GRACE_MS", default_value_t = 5_000)]
    pub terminate_grace_ms: u64,

    /// InstallQueue capacity.
    #[arg(long, env = "SIDECAR_MAX_CONCURRENT_INSTALLS", default_value_t = 4)]
    pub max_concurrent_installs: usize,

    /// Dispatcher retry ceiling.
    #[arg(long, env = "SIDECAR_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Base delay for the Dispatcher's exponential backoff, in milliseconds.
    #[arg(long, env = "SIDECAR_RETRY_BASE_MS", default_value_t = 100)]
    pub retry_base_ms: u64,

    /// The interpreter command invoked for every worker, e.g. "node". Space
    /// separated; the sandbox's source file path is passed via an env var,
    /// not appended here.
    #[arg(long, env = "SIDECAR_WORKER_COMMAND", default_value = "node")]
    pub worker_command: String,
}

impl Cli {
    pub fn into_config(self) -> Config {
        Config {
            grpc_address: self.grpc_address,
            scratch_root: self.scratch_root,
            shared_modules_path: self.shared_modules_path,
            gc_interval: Duration::from_millis(self.gc_interval_ms),
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            tls_enabled: self.tls_enabled,
            tls_cert_file: self.tls_cert_file,
            tls_key_file: self.tls_key_file,
            log_level: self.log_level,
            log_format: self.log_format,
            health_check_wait: Duration::from_millis(self.health_check_wait_ms),
            health_check_interval: Duration::from_millis(self.health_check_interval_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            terminate_grace: Duration::from_millis(self.terminate_grace_ms),
            max_concurrent_installs: self.max_concurrent_installs,
            max_retries: self.max_retries,
            retry_base: Duration::from_millis(self.retry_base_ms),
            worker_command: self
                .worker_command
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_a_valid_config() {
        let cli = Cli::parse_from(["sidecard"]);
        let config = cli.into_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_command, vec!["node".to_string()]);
    }

    #[test]
    fn worker_command_splits_on_whitespace() {
        let cli = Cli::parse_from(["sidecard", "--worker-command", "node --experimental-vm-modules"]);
        let config = cli.into_config();
        assert_eq!(
            config.worker_command,
            vec!["node".to_string(), "--experimental-vm-modules".to_string()]
        );
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from(["sidecard", "--grpc-address", "0.0.0.0:9000", "--max-retries", "7"]);
        let config = cli.into_config();
        assert_eq!(config.grpc_address, "0.0.0.0:9000");
        assert_eq!(config.max_retries, 7);
    }
}

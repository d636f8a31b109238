// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-side logging setup (`log_level`/`log_format`, spec §4.10): a
//! `tracing-subscriber` registry with an `EnvFilter` and a `fmt` layer.
//! `sidecard` always runs as a supervised sidecar process rather than a
//! user-level background daemon, so it logs to its standard streams
//! instead of a rotated log file; `RUST_LOG`, when set, still takes
//! priority over `log_level`.

use sidecar_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to install global tracing subscriber: {0}")]
    Init(String),
}

/// Installs the global `tracing` subscriber. Call once, at the very start
/// of `main`.
pub fn init(config: &Config) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let result = if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_and_pretty_formats_both_build_without_panicking() {
        // try_init only fails if a global subscriber is already set, which
        // other tests in this process may have done first; either outcome
        // (installed, or "already set") is acceptable here.
        let mut config = Config::default();
        config.log_format = "json".to_string();
        let _ = init(&config);
        config.log_format = "pretty".to_string();
        let _ = init(&config);
    }
}

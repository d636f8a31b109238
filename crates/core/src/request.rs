// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C11 AdapterIface: the types the composition-engine adapter passes into,
//! and receives out of, the core (spec §4.11, §6). The core never
//! interprets `RunResponse`'s bytes — that is the adapter's job.

use serde::{Deserialize, Serialize};

use crate::source::SourceContract;

/// What the adapter gives the core: the source contract that identifies
/// (and, on first use, materializes) a worker, plus an opaque JSON payload
/// forwarded verbatim to the worker's `/execute` endpoint.
///
/// `api_version`/`kind` are carried through for observability only (spec
/// §3) — they never enter the fingerprint and never affect routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub source: SourceContract,
    /// Opaque to the core; forwarded as the worker's `input` field.
    pub payload: serde_json::Value,
}

/// What the core returns: the worker's opaque response, already
/// JSON-decoded for convenience but never interpreted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub body: serde_json::Value,
}

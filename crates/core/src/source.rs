// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The source contract (spec §3): the part of a request that identifies a
//! worker. Two requests with byte-identical `SourceContract`s (after
//! canonicalization) route to the same worker; any difference routes to a
//! different one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The user-authored fragment plus everything needed to materialize its
/// sandbox. `params`/`target`/`apiVersion`/`kind` deliberately do NOT live
/// here — they are request-scoped, not worker-scoped (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContract {
    /// The user source fragment. Required, non-empty.
    pub inline: String,

    /// Declared package-manager dependencies: name -> version specifier.
    /// A `BTreeMap` so key order never affects the fingerprint (spec §3:
    /// "keys unique, order irrelevant").
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    /// Opaque lockfile text, written verbatim into the sandbox.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockfile: Option<String>,

    /// Opaque compiler/tsconfig text, written verbatim into the sandbox.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "tsConfig")]
    pub ts_config: Option<String>,
}

impl SourceContract {
    /// spec §7 `ErrInvalidInput`: the source fragment must be non-empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.inline.trim().is_empty() {
            return Err("source.inline must not be empty".to_string());
        }
        Ok(())
    }

    /// Whether this source declares any dependencies — decides whether the
    /// sandbox gets a generated manifest (spec §3, §4.3) and whether an
    /// install job is submitted (spec §4.6 step 5).
    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C1: Fingerprint — canonicalize the input contract into a stable hex
//! digest (spec §4.1).
//!
//! The canonical form sorts mapping keys and fixes whitespace, then hashes
//! with SHA-256. `BTreeMap` already keeps `SourceContract::dependencies`
//! sorted, so the only normalization left is trimming the fragment's
//! trailing whitespace — deliberately narrow, since over-normalizing (e.g.
//! collapsing internal whitespace) would violate spec §3's "any difference
//! in `source` MUST NOT [collide]" requirement for P2.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::source::SourceContract;

/// A 256-bit digest over a canonicalized `SourceContract`, hex-encoded.
/// Also the registry's map key (spec §3 invariant I1).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `n` hex characters, used to name the sandbox directory
    /// without spelling out the full 64-character digest (spec §3).
    pub fn prefix(&self, n: usize) -> &str {
        use crate::id::ShortId;
        self.0.short(n)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.prefix(12))
    }
}

/// Canonical serialization of a `SourceContract`: a newline-joined,
/// field-ordered text form. `BTreeMap` iteration already sorts dependency
/// keys; the fragment is trimmed of leading/trailing whitespace so that
/// two byte-different-but-equivalent uploads (e.g. a trailing newline added
/// by an editor) still collapse to one worker — this is a deliberate,
/// narrow normalization, not general code formatting.
fn canonicalize(source: &SourceContract) -> String {
    let mut buf = String::new();
    buf.push_str("inline:");
    buf.push_str(source.inline.trim());
    buf.push('\n');

    buf.push_str("deps:");
    for (name, version) in &source.dependencies {
        buf.push_str(name);
        buf.push('=');
        buf.push_str(version);
        buf.push(';');
    }
    buf.push('\n');

    buf.push_str("lockfile:");
    if let Some(lockfile) = &source.lockfile {
        buf.push_str(lockfile);
    }
    buf.push('\n');

    buf.push_str("tsconfig:");
    if let Some(ts_config) = &source.ts_config {
        buf.push_str(ts_config);
    }
    buf.push('\n');

    buf
}

/// `digest(source) -> hex256` (spec §4.1).
pub fn digest(source: &SourceContract) -> Fingerprint {
    let canonical = canonicalize(source);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let result = hasher.finalize();
    Fingerprint(hex_encode(&result))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

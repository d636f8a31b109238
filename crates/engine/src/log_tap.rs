// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C9 LogTap (spec §4.9): line-oriented capture of a worker's stdout and
//! stderr, forwarded into the host's own tracing output tagged with the
//! worker's fingerprint prefix.

use std::sync::Arc;

use parking_lot::Mutex;
use sidecar_adapters::StreamTag;
use tracing::{debug, error, info, trace, warn};

/// A recognized structured-log level, mapped onto the host's tracing
/// levels (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    fn parse(raw: &serde_json::Value) -> Option<Level> {
        if let Some(s) = raw.as_str() {
            return Self::from_str(s);
        }
        if let Some(n) = raw.as_i64() {
            return Self::from_numeric(n);
        }
        None
    }

    fn from_str(s: &str) -> Option<Level> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" | "panic" | "critical" => Some(Level::Fatal),
            _ => None,
        }
    }

    /// Syslog-style numeric levels, low number = more severe.
    fn from_numeric(n: i64) -> Option<Level> {
        match n {
            0..=2 => Some(Level::Fatal),
            3 => Some(Level::Error),
            4 => Some(Level::Warn),
            5 | 6 => Some(Level::Info),
            7 => Some(Level::Debug),
            _ => None,
        }
    }
}

struct Buffer {
    partial: Vec<u8>,
}

/// Per-worker log capture. One instance shared by the stdout and stderr
/// writer adapters spawned for that worker.
pub struct LogTap {
    fingerprint_prefix: String,
    stdout: Mutex<Buffer>,
    stderr: Mutex<Buffer>,
}

impl LogTap {
    pub fn new(fingerprint_prefix: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            fingerprint_prefix: fingerprint_prefix.into(),
            stdout: Mutex::new(Buffer { partial: Vec::new() }),
            stderr: Mutex::new(Buffer { partial: Vec::new() }),
        })
    }

    /// Feed a chunk of bytes from `stream`. Splits on newline, emits one
    /// log event per complete line, and retains a trailing partial line
    /// for the next call (spec §4.9).
    pub fn write(&self, stream: StreamTag, chunk: &[u8]) {
        let buffer = match stream {
            StreamTag::Stdout => &self.stdout,
            StreamTag::Stderr => &self.stderr,
        };

        let mut guard = buffer.lock();
        guard.partial.extend_from_slice(chunk);

        loop {
            let Some(pos) = guard.partial.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = guard.partial.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            drop(guard);
            self.emit_line(stream, line);
            guard = buffer.lock();
        }
    }

    /// Flush any retained partial line, tagged `incomplete` (spec §4.9).
    /// Called on worker termination.
    pub fn flush(&self) {
        self.flush_stream(StreamTag::Stdout);
        self.flush_stream(StreamTag::Stderr);
    }

    fn flush_stream(&self, stream: StreamTag) {
        let buffer = match stream {
            StreamTag::Stdout => &self.stdout,
            StreamTag::Stderr => &self.stderr,
        };
        let remainder = {
            let mut guard = buffer.lock();
            std::mem::take(&mut guard.partial)
        };
        if remainder.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&remainder);
        warn!(
            fingerprint = %self.fingerprint_prefix,
            stream = stream_name(stream),
            incomplete = true,
            line = %text,
            "worker log (incomplete line)"
        );
    }

    fn emit_line(&self, stream: StreamTag, line: &[u8]) {
        let text = String::from_utf8_lossy(line);

        if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(&text)
        {
            let level = fields
                .get("level")
                .or_else(|| fields.get("severity"))
                .and_then(Level::parse)
                .unwrap_or(Level::Info);
            self.emit_structured(stream, level, &fields);
            return;
        }

        if stream == StreamTag::Stderr || looks_like_error(&text) {
            error!(fingerprint = %self.fingerprint_prefix, stream = stream_name(stream), line = %text, "worker log");
        } else {
            info!(fingerprint = %self.fingerprint_prefix, stream = stream_name(stream), line = %text, "worker log");
        }
    }

    fn emit_structured(
        &self,
        stream: StreamTag,
        level: Level,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) {
        let body = serde_json::Value::Object(fields.clone()).to_string();
        match level {
            Level::Trace => {
                trace!(fingerprint = %self.fingerprint_prefix, stream = stream_name(stream), fields = %body, "worker log")
            }
            Level::Debug => {
                debug!(fingerprint = %self.fingerprint_prefix, stream = stream_name(stream), fields = %body, "worker log")
            }
            Level::Info => {
                info!(fingerprint = %self.fingerprint_prefix, stream = stream_name(stream), fields = %body, "worker log")
            }
            Level::Warn => {
                warn!(fingerprint = %self.fingerprint_prefix, stream = stream_name(stream), fields = %body, "worker log")
            }
            Level::Error | Level::Fatal => {
                error!(fingerprint = %self.fingerprint_prefix, stream = stream_name(stream), fields = %body, "worker log")
            }
        }
    }
}

fn stream_name(stream: StreamTag) -> &'static str {
    match stream {
        StreamTag::Stdout => "stdout",
        StreamTag::Stderr => "stderr",
    }
}

fn looks_like_error(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    ["error", "exception", "fail", "fatal"]
        .iter()
        .any(|needle| lower.contains(needle))
}

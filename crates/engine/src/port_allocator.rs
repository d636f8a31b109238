// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C2 PortAllocator (spec §4.2): hand out a free local TCP port by binding
//! to an ephemeral port, reading it back, and releasing the socket. The OS
//! won't reassign that exact port to a concurrent `acquire()` until it's
//! been closed, but there's a small window between our close and the
//! child's bind where another process could grab it — spec §9 accepts
//! this and pushes recovery onto the worker's own fast-fail-on-start-up
//! plus the Dispatcher's retry.

use thiserror::Error;
use tokio::net::TcpListener;

#[derive(Debug, Error, Clone, Copy)]
#[error("port exhausted")]
pub struct PortExhausted;

#[derive(Debug, Clone, Default)]
pub struct PortAllocator;

impl PortAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Ask the OS for an ephemeral port on loopback.
    pub async fn acquire(&self) -> Result<u16, PortExhausted> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|_| PortExhausted)?;
        let port = listener.local_addr().map_err(|_| PortExhausted)?.port();
        drop(listener);
        Ok(port)
    }

    /// No-op: the OS reuses ports once closed (spec §4.2). Kept as an
    /// explicit method so call sites read as "give this port back" even
    /// though there's nothing to track.
    pub fn release(&self, _port: u16) {}
}

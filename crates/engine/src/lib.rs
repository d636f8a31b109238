// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sidecar-engine: the worker pool itself — fingerprinting consumers
//! (C1/C6), sandbox materialization (C3), dependency installs (C4), log
//! capture (C9), port allocation (C2), and the dispatch/reap loops that
//! sit above the registry (C7/C8).

pub mod dispatcher;
pub mod install_queue;
pub mod log_tap;
pub mod port_allocator;
pub mod reaper;
pub mod sandbox;
pub mod supervisor;
pub mod worker_record;

pub use dispatcher::{Dispatcher, DispatchError};
pub use install_queue::InstallQueue;
pub use log_tap::LogTap;
pub use port_allocator::{PortAllocator, PortExhausted};
pub use reaper::spawn_reaper;
pub use sandbox::{SandboxBuilder, SandboxError};
pub use supervisor::{SupervisorError, WorkerHandle, WorkerSupervisor};
pub use worker_record::{WorkerRecord, WorkerState};

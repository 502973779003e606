// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Cell lifecycle orchestration: the start/stop state machine tying the
//! uplink segmenter, subnet allocator, backend drivers, endpoint registry
//! and flow applier together.

#[macro_use]
extern crate slog;

logging::logger_with_subsystem!(sl, "lifecycle");

mod guard;
mod orchestrator;
mod report;

pub use guard::SegmentGuard;
pub use orchestrator::Orchestrator;
pub use report::{EndpointStatus, StartReport, StopReport};

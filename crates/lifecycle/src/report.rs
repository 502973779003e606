// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::net::Ipv4Addr;

use backend::Attachment;
use fabric::UplinkSegment;

/// Outcome for one endpoint of a `start` run.
#[derive(Clone, Debug)]
pub struct EndpointStatus {
    pub name: String,
    pub address: Ipv4Addr,
    pub attachment: Option<Attachment>,
    /// Per-endpoint isolation failure, if any; other endpoints proceed
    /// independently.
    pub error: Option<String>,
}

impl EndpointStatus {
    pub fn isolated(&self) -> bool {
        self.error.is_none() && self.attachment.is_some()
    }
}

/// Result of a `start` run.
#[derive(Debug)]
pub struct StartReport {
    pub segment: UplinkSegment,
    pub gateway: Ipv4Addr,
    pub endpoints: Vec<EndpointStatus>,
}

impl StartReport {
    pub fn fully_isolated(&self) -> bool {
        self.endpoints.iter().all(EndpointStatus::isolated)
    }

    pub fn failures(&self) -> impl Iterator<Item = &EndpointStatus> {
        self.endpoints.iter().filter(|e| !e.isolated())
    }
}

/// Result of a best-effort `stop` sweep. Individual failures are collected,
/// never raised, so teardown always makes maximal progress.
#[derive(Debug, Default)]
pub struct StopReport {
    pub flows_revoked: bool,
    pub removed_endpoints: Vec<String>,
    pub segment_removed: bool,
    pub failures: Vec<String>,
}

impl StopReport {
    pub fn clean(&self) -> bool {
        self.failures.is_empty()
    }
}

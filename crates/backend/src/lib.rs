// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Endpoint backend drivers.
//!
//! Every backend kind (VM hypervisor, container runtime) is driven through
//! the single [`Driver`] capability trait, so the lifecycle orchestrator
//! never branches on the kind.

#[macro_use]
extern crate slog;

logging::logger_with_subsystem!(sl, "backend");

mod cmd;
pub mod container;
pub mod virsh;

use std::net::Ipv4Addr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use netcell_types::BackendKind;
use thiserror::Error;

pub use container::ContainerDriver;
pub use virsh::VirshDriver;

/// Errors raised by backend drivers.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// The named endpoint is not present in the live inventory, or its
    /// network attachment has not appeared yet. Callers treat this as a
    /// retryable "not ready" condition, never as fatal on teardown.
    #[error("endpoint {0} is not running")]
    NotRunning(String),

    #[error("backend {op} for endpoint {name} failed: {msg}")]
    Backend {
        op: &'static str,
        name: String,
        msg: String,
    },
}

/// A live endpoint's binding to the software switch: the switch port
/// carrying its traffic and the MAC its inbound frames are addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub port: String,
    pub mac: String,
}

/// Guest-side network configuration injected into a created endpoint.
/// Produced from the cell's subnet plan; how the payload reaches the guest
/// is the driver's concern.
#[derive(Clone, Debug)]
pub struct GuestNetConfig {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    pub gateway: Ipv4Addr,
}

/// Everything a driver needs to create one endpoint.
#[derive(Clone, Debug)]
pub struct CreateSpec {
    /// Ready-to-boot base image reference (from the image provider).
    pub image: String,
    /// Software switch bridge the endpoint attaches to.
    pub bridge: String,
    /// Deterministically synthesized MAC for the endpoint's interface.
    pub mac: String,
    /// Guest network payload.
    pub net: GuestNetConfig,
}

/// Capability interface over heterogeneous endpoint backends.
#[async_trait]
pub trait Driver: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Creates and starts one endpoint. Must be left fully torn down by
    /// [`Driver::destroy`] if a later step of the run fails.
    async fn create(&self, name: &str, spec: &CreateSpec) -> Result<()>;

    /// Destroys one endpoint. Destroying an endpoint that is already gone
    /// is not an error.
    async fn destroy(&self, name: &str) -> Result<()>;

    /// Lists live endpoint names starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Whether the named endpoint is currently running.
    async fn running(&self, name: &str) -> Result<bool>;

    /// Resolves the endpoint's live network attachment.
    async fn attachment(&self, name: &str) -> Result<Attachment, EndpointError>;
}

/// Builds the driver for a backend kind.
pub fn new_driver(kind: BackendKind, bridge: &str) -> Arc<dyn Driver> {
    match kind {
        BackendKind::Vm => Arc::new(VirshDriver::new(bridge)),
        BackendKind::Container => Arc::new(ContainerDriver::new(bridge)),
    }
}

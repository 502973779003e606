// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Smallest usable 802.1Q VLAN id.
pub const VLAN_ID_MIN: u16 = 1;
/// Largest usable 802.1Q VLAN id (4095 is reserved).
pub const VLAN_ID_MAX: u16 = 4094;

/// Default software switch the cell is wired through.
pub const DEFAULT_BRIDGE: &str = "cellbr0";

// The gateway always takes the first host address, so endpoint offsets
// below 2 would collide with it.
const MIN_HOST_OFFSET: u8 = 2;

/// The kind of backend an endpoint runs on.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// Hypervisor-managed virtual machine.
    Vm,
    /// Container with its own network namespace.
    Container,
}

/// How the physical uplink is referenced in configuration. A MAC reference
/// is resolved to an interface name before any mutation happens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UplinkRef {
    Name(String),
    Mac(String),
}

/// Errors detected before any host state is touched.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("VLAN id {0} out of range [1, 4094]")]
    VlanOutOfRange(u16),

    #[error("invalid subnet {0}: {1}")]
    InvalidSubnet(String, String),

    #[error("endpoint count must be a positive integer")]
    ZeroCount,

    #[error("host offset {0} would collide with the gateway address")]
    OffsetTooSmall(u8),

    #[error("subnet {subnet} cannot hold {count} endpoints at offset {offset}")]
    SubnetExhausted {
        subnet: String,
        offset: u8,
        count: u32,
    },
}

/// Configuration for one cell: a group of isolated endpoints sharing a
/// physical uplink through a dedicated VLAN segment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellConfig {
    /// The shared physical uplink, by name or by MAC address.
    pub uplink: UplinkRef,
    /// 802.1Q VLAN id carrying this cell's traffic.
    pub vlan_id: u16,
    /// Cell subnet in CIDR form, e.g. "192.168.10.0/24".
    pub subnet: String,
    /// Number of endpoints to provision.
    pub count: u32,
    /// Which backend the endpoints run on.
    pub backend: BackendKind,
    /// Endpoint name prefix; defaults to a VLAN-derived prefix so that
    /// repeated runs against the same cell converge on the same names.
    pub prefix: Option<String>,
    /// First host offset handed to endpoints (gateway is always .1).
    pub offset: u8,
    /// Name of the software switch bridge.
    pub bridge: String,
    /// Base image reference handed to the backend driver.
    pub image: String,
}

impl CellConfig {
    /// Endpoint name prefix for this cell.
    pub fn endpoint_prefix(&self) -> String {
        match &self.prefix {
            Some(p) => p.clone(),
            None => format!("cell{}-ep", self.vlan_id),
        }
    }

    /// Deterministic endpoint name for an ordinal in `1..=count`.
    pub fn endpoint_name(&self, ordinal: u32) -> String {
        format!("{}{}", self.endpoint_prefix(), ordinal)
    }

    /// Validates the configuration. Nothing on the host is inspected or
    /// mutated here; this only checks internal consistency.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(VLAN_ID_MIN..=VLAN_ID_MAX).contains(&self.vlan_id) {
            return Err(ValidationError::VlanOutOfRange(self.vlan_id));
        }
        if self.count == 0 {
            return Err(ValidationError::ZeroCount);
        }
        if self.offset < MIN_HOST_OFFSET {
            return Err(ValidationError::OffsetTooSmall(self.offset));
        }

        // ipnetwork parses a bare address as a /32 network; a cell subnet
        // must spell its prefix out.
        if !self.subnet.contains('/') {
            return Err(ValidationError::InvalidSubnet(
                self.subnet.clone(),
                "missing /prefix".to_string(),
            ));
        }
        let net: Ipv4Network = self
            .subnet
            .parse()
            .map_err(|e: ipnetwork::IpNetworkError| {
                ValidationError::InvalidSubnet(self.subnet.clone(), e.to_string())
            })?;

        // The highest assigned host index must stay below the broadcast
        // address: base + offset + count <= broadcast - 1.
        let capacity = u64::from(net.size());
        if capacity < 4 || u64::from(self.offset) + u64::from(self.count) > capacity - 2 {
            return Err(ValidationError::SubnetExhausted {
                subnet: self.subnet.clone(),
                offset: self.offset,
                count: self.count,
            });
        }

        Ok(())
    }
}

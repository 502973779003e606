// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! The network fabric: uplink VLAN segmentation, deterministic addressing,
//! flow-rule compilation and application, and the read-through endpoint
//! registry.

#[macro_use]
extern crate slog;

logging::logger_with_subsystem!(sl, "fabric");

pub mod address;
pub mod flows;
pub mod link_ops;
pub mod mac;
pub mod reconcile;
pub mod registry;
pub mod switch;
pub mod uplink;

pub use address::SubnetPlan;
pub use flows::{FlowApplier, FlowError, FlowRule, IsolationPair};
pub use link_ops::{LinkInfo, LinkOps, NetlinkOps};
pub use registry::EndpointRegistry;
pub use switch::{OvsSwitch, SwitchOps};
pub use uplink::{ResolutionError, SegmentError, UplinkSegment};

// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Constants and data types shared by netcell components.

/// Cell configuration and validation.
pub mod config;

/// Deployment profiles (fixed host-address offsets).
pub mod profile;

pub use config::{
    BackendKind, CellConfig, UplinkRef, ValidationError, DEFAULT_BRIDGE, VLAN_ID_MAX, VLAN_ID_MIN,
};
pub use profile::Profile;

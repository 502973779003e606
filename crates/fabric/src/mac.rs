// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! MAC address helpers.

use anyhow::{anyhow, Result};

/// Parses a colon-separated MAC address into its six bytes.
pub fn parse(s: &str) -> Option<[u8; 6]> {
    let v: Vec<_> = s.split(':').collect();
    if v.len() != 6 {
        return None;
    }
    let mut bytes = [0u8; 6];
    for i in 0..6 {
        bytes[i] = u8::from_str_radix(v[i], 16).ok()?;
    }
    Some(bytes)
}

/// Formats six bytes as a lowercase colon-separated MAC address.
pub fn format(b: &[u8]) -> Result<String> {
    if b.len() != 6 {
        return Err(anyhow!("invalid mac address {:?}", b));
    }
    Ok(format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5]
    ))
}

/// Canonical (lowercase) form for case-insensitive comparison.
pub fn normalize(s: &str) -> Option<String> {
    parse(s).and_then(|b| format(&b).ok())
}

/// Synthesizes the deterministic, locally-administered MAC for an endpoint.
/// The VLAN id and ordinal are both encoded, so no two endpoints of any two
/// cells collide, and re-running a cell converges on the same addresses.
pub fn synthesize(vlan_id: u16, ordinal: u32) -> String {
    format!(
        "52:54:{:02x}:{:02x}:{:02x}:{:02x}",
        (vlan_id >> 8) as u8,
        (vlan_id & 0xff) as u8,
        ((ordinal >> 8) & 0xff) as u8,
        (ordinal & 0xff) as u8
    )
}

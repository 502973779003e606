// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Flow-rule compilation: one symmetric isolation pair per endpoint.

pub mod applier;

pub use applier::{FlowApplier, FlowError};

/// Cookie stamped on every rule this system installs, so revocation can
/// target managed rules and nothing else on a shared bridge.
pub const FLOW_COOKIE: u64 = 0x6e633031; // "nc01"

/// Priority of isolation rules; above the bridge's NORMAL default.
pub const FLOW_PRIORITY: u16 = 100;

/// One match/action rule in OpenFlow text form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlowRule {
    matches: Vec<String>,
    actions: Vec<String>,
}

impl FlowRule {
    /// The full specification handed to `add-flow`.
    pub fn add_spec(&self) -> String {
        format!(
            "cookie={:#x},priority={},{},actions={}",
            FLOW_COOKIE,
            FLOW_PRIORITY,
            self.matches.join(","),
            self.actions.join(",")
        )
    }

    /// The cookie-scoped match specification handed to `del-flows`.
    pub fn match_spec(&self) -> String {
        format!("cookie={:#x}/-1,{}", FLOW_COOKIE, self.matches.join(","))
    }
}

/// Cookie-scoped spec matching every rule this system owns.
pub fn all_managed_spec() -> String {
    format!("cookie={:#x}/-1", FLOW_COOKIE)
}

/// The two rules confining one endpoint's traffic to its uplink path.
///
/// The uplink port is the segment's 802.1Q kernel sub-interface, and a
/// kernel VLAN device strips the tag on receive and pushes it on transmit.
/// Frames on that port therefore arrive untagged and already demuxed to
/// this segment's VLAN, so the rules must neither match nor rewrite tags:
/// a `dl_vlan` match would never fire, and a `mod_vlan_vid` action would
/// double-tag the wire traffic. The VLAN identity lives in the port itself,
/// which keeps two cells reusing a MAC from mis-delivering frames — each
/// cell's return traffic enters through its own uplink port.
///
/// The matches are deliberately asymmetric: the endpoint's own port only
/// ever carries that endpoint's outbound traffic, so ingress port alone
/// identifies it; the uplink port carries every endpoint of this segment,
/// so inbound rules disambiguate by destination MAC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsolationPair {
    pub outbound: FlowRule,
    pub inbound: FlowRule,
}

impl IsolationPair {
    pub fn compile(uplink_port: &str, endpoint_port: &str, endpoint_mac: &str) -> Self {
        let outbound = FlowRule {
            matches: vec![format!("in_port={}", endpoint_port)],
            actions: vec![format!("output:{}", uplink_port)],
        };
        let inbound = FlowRule {
            matches: vec![
                format!("in_port={}", uplink_port),
                format!("dl_dst={}", endpoint_mac),
            ],
            actions: vec![format!("output:{}", endpoint_port)],
        };
        Self { outbound, inbound }
    }

    /// Cookie-scoped specs removing exactly this endpoint's pair.
    pub fn revoke_specs(&self) -> [String; 2] {
        [self.outbound.match_spec(), self.inbound.match_spec()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_outbound_matches_port_only() {
        let pair = IsolationPair::compile("eth0.100", "vnet3", "52:54:00:64:00:01");
        let spec = pair.outbound.add_spec();
        assert_eq!(
            spec,
            "cookie=0x6e633031,priority=100,in_port=vnet3,actions=output:eth0.100"
        );
        assert!(!spec.contains("dl_dst"));
    }

    #[test]
    fn test_compile_inbound_matches_uplink_port_and_mac() {
        let pair = IsolationPair::compile("eth0.100", "vnet3", "52:54:00:64:00:01");
        let spec = pair.inbound.add_spec();
        assert_eq!(
            spec,
            "cookie=0x6e633031,priority=100,in_port=eth0.100,dl_dst=52:54:00:64:00:01,actions=output:vnet3"
        );
    }

    #[test]
    fn test_rules_leave_tagging_to_the_uplink_device() {
        // The kernel sub-interface pushes and strips the 802.1Q tag, so a
        // tag match would see only untagged frames and a tag rewrite would
        // double-tag on egress.
        let pair = IsolationPair::compile("eth0.100", "vnet3", "52:54:00:64:00:01");
        for spec in [pair.outbound.add_spec(), pair.inbound.add_spec()] {
            assert!(!spec.contains("dl_vlan"));
            assert!(!spec.contains("mod_vlan_vid"));
            assert!(!spec.contains("strip_vlan"));
        }
    }

    #[test]
    fn test_shared_mac_stays_separate_across_segments() {
        let mac = "52:54:00:aa:bb:cc";
        let a = IsolationPair::compile("eth0.100", "vnet3", mac);
        let b = IsolationPair::compile("eth0.200", "vnet7", mac);
        assert_ne!(a.inbound.match_spec(), b.inbound.match_spec());
    }

    #[test]
    fn test_revoke_specs_are_cookie_scoped() {
        let pair = IsolationPair::compile("eth0.100", "vnet3", "52:54:00:64:00:01");
        for spec in pair.revoke_specs() {
            assert!(spec.starts_with("cookie=0x6e633031/-1,"));
        }
        assert_eq!(all_managed_spec(), "cookie=0x6e633031/-1");
    }
}

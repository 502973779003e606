// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Deterministic per-endpoint addressing: a pure mapping from
//! (subnet, offset, ordinal) to an endpoint address.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use netcell_types::ValidationError;

/// Address plan for one cell subnet.
#[derive(Clone, Copy, Debug)]
pub struct SubnetPlan {
    net: Ipv4Network,
    offset: u8,
}

impl SubnetPlan {
    pub fn new(cidr: &str, offset: u8) -> Result<Self, ValidationError> {
        // ipnetwork parses a bare address as a /32 network; require an
        // explicit prefix.
        if !cidr.contains('/') {
            return Err(ValidationError::InvalidSubnet(
                cidr.to_string(),
                "missing /prefix".to_string(),
            ));
        }
        let net: Ipv4Network = cidr.parse().map_err(|e: ipnetwork::IpNetworkError| {
            ValidationError::InvalidSubnet(cidr.to_string(), e.to_string())
        })?;
        if offset < 2 {
            return Err(ValidationError::OffsetTooSmall(offset));
        }
        Ok(Self { net, offset })
    }

    fn nth(&self, index: u32) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.net.network()) + index)
    }

    /// The gateway always takes the first host address.
    pub fn gateway(&self) -> Ipv4Addr {
        self.nth(1)
    }

    /// Address for the endpoint with the given ordinal (1-based). Total
    /// function of (subnet, offset, ordinal); ordinals never collide with
    /// each other or with the gateway.
    pub fn endpoint_ip(&self, ordinal: u32) -> Result<Ipv4Addr, ValidationError> {
        let exhausted = || ValidationError::SubnetExhausted {
            subnet: self.net.to_string(),
            offset: self.offset,
            count: ordinal,
        };

        if ordinal == 0 {
            return Err(exhausted());
        }
        let index = u64::from(self.offset) + u64::from(ordinal);
        // Must stay strictly between the gateway and the broadcast address.
        if index >= u64::from(self.net.size()) - 1 {
            return Err(exhausted());
        }
        Ok(self.nth(index as u32))
    }

    pub fn prefix(&self) -> u8 {
        self.net.prefix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_offset_scenario() {
        // subnet 192.168.10.0/24, count 3, offset 9 -> .10, .11, .12
        let plan = SubnetPlan::new("192.168.10.0/24", 9).unwrap();
        assert_eq!(plan.endpoint_ip(1).unwrap(), "192.168.10.10".parse::<Ipv4Addr>().unwrap());
        assert_eq!(plan.endpoint_ip(2).unwrap(), "192.168.10.11".parse::<Ipv4Addr>().unwrap());
        assert_eq!(plan.endpoint_ip(3).unwrap(), "192.168.10.12".parse::<Ipv4Addr>().unwrap());
        assert_eq!(plan.gateway(), "192.168.10.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(plan.prefix(), 24);
    }

    #[test]
    fn test_allocations_are_distinct_and_skip_gateway() {
        let plan = SubnetPlan::new("10.20.30.0/24", 10).unwrap();
        let mut seen = HashSet::new();
        for ordinal in 1..=100 {
            let ip = plan.endpoint_ip(ordinal).unwrap();
            assert_ne!(ip, plan.gateway());
            assert!(seen.insert(ip), "duplicate allocation {}", ip);
        }
    }

    #[test]
    fn test_exhaustion_at_broadcast() {
        let plan = SubnetPlan::new("10.0.0.0/29", 2).unwrap();
        // size 8: network .0, gateway .1, broadcast .7 -> ordinals 1..=4 fit.
        assert!(plan.endpoint_ip(4).is_ok());
        assert!(matches!(
            plan.endpoint_ip(5),
            Err(ValidationError::SubnetExhausted { .. })
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            SubnetPlan::new("300.1.2.3/24", 10),
            Err(ValidationError::InvalidSubnet(..))
        ));
        // A bare address must not slip through as a /32.
        assert!(matches!(
            SubnetPlan::new("192.168.10.0", 10),
            Err(ValidationError::InvalidSubnet(..))
        ));
        assert!(matches!(
            SubnetPlan::new("10.0.0.0/24", 1),
            Err(ValidationError::OffsetTooSmall(1))
        ));
        let plan = SubnetPlan::new("10.0.0.0/24", 10).unwrap();
        assert!(plan.endpoint_ip(0).is_err());
    }
}

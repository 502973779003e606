// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Process-wide exclusion on (physical uplink, VLAN id). Concurrent runs
//! against the same segment would race on sub-interface creation and on
//! flow-table writes, so a second holder is rejected rather than queued.

use std::collections::HashSet;
use std::sync::Mutex;

use lazy_static::lazy_static;

use fabric::uplink::{segment_name, SegmentError};

lazy_static! {
    static ref ACTIVE_SEGMENTS: Mutex<HashSet<(String, u16)>> = Mutex::new(HashSet::new());
}

fn registry() -> std::sync::MutexGuard<'static, HashSet<(String, u16)>> {
    match ACTIVE_SEGMENTS.lock() {
        Ok(g) => g,
        // A holder never panics while mutating the set; recover the data.
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// RAII holder of one (physical, vlan) key.
#[derive(Debug)]
pub struct SegmentGuard {
    key: (String, u16),
}

impl SegmentGuard {
    pub fn acquire(physical: &str, vlan_id: u16) -> Result<Self, SegmentError> {
        let key = (physical.to_string(), vlan_id);
        if !registry().insert(key.clone()) {
            return Err(SegmentError::Busy(segment_name(physical, vlan_id)));
        }
        Ok(Self { key })
    }
}

impl Drop for SegmentGuard {
    fn drop(&mut self) {
        registry().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_holder_rejected_until_release() {
        let first = SegmentGuard::acquire("guard-eth0", 42).unwrap();
        assert!(matches!(
            SegmentGuard::acquire("guard-eth0", 42),
            Err(SegmentError::Busy(_))
        ));
        // A different key is unaffected.
        let _other = SegmentGuard::acquire("guard-eth0", 43).unwrap();

        drop(first);
        let _again = SegmentGuard::acquire("guard-eth0", 42).unwrap();
    }
}

// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Uplink segmentation: one VLAN sub-interface per (physical, vlan) pair.

use thiserror::Error;

use netcell_types::UplinkRef;

use crate::link_ops::LinkOps;
use crate::mac;

/// A VLAN segment bound to a physical uplink. The sub-interface name is a
/// pure function of (physical, vlan), so repeated creation converges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UplinkSegment {
    pub physical: String,
    pub vlan_id: u16,
    pub name: String,
}

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("no host interface named {0}")]
    NoSuchInterface(String),

    #[error("no host interface with MAC {0}")]
    MacNotMatched(String),

    #[error("uplink lookup failed: {0}")]
    Lookup(String),
}

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("segment {0} is busy: another run owns it")]
    Busy(String),

    #[error("failed to create VLAN sub-interface {name}: {msg}")]
    Create { name: String, msg: String },

    #[error("failed to remove VLAN sub-interface {name}: {msg}")]
    Remove { name: String, msg: String },
}

/// Deterministic sub-interface name for a (physical, vlan) pair.
pub fn segment_name(physical: &str, vlan_id: u16) -> String {
    format!("{}.{}", physical, vlan_id)
}

/// Resolves an uplink reference to a live interface name. A MAC reference
/// is matched case-insensitively against the host link dump. Fails before
/// any mutation, so resolution errors never need unwinding.
pub async fn resolve(links: &dyn LinkOps, uplink: &UplinkRef) -> Result<String, ResolutionError> {
    match uplink {
        UplinkRef::Name(name) => {
            let index = links
                .index_of(name)
                .await
                .map_err(|e| ResolutionError::Lookup(format!("{:#}", e)))?;
            if index.is_none() {
                return Err(ResolutionError::NoSuchInterface(name.clone()));
            }
            Ok(name.clone())
        }
        UplinkRef::Mac(given) => {
            let wanted = mac::normalize(given)
                .ok_or_else(|| ResolutionError::MacNotMatched(given.clone()))?;
            let all = links
                .list()
                .await
                .map_err(|e| ResolutionError::Lookup(format!("{:#}", e)))?;
            all.into_iter()
                .find(|l| l.mac == wanted)
                .map(|l| l.name)
                .ok_or_else(|| ResolutionError::MacNotMatched(given.clone()))
        }
    }
}

/// Ensures the VLAN sub-interface for (physical, vlan) exists and is up.
/// An already-present sub-interface is reused, not recreated.
pub async fn ensure(
    links: &dyn LinkOps,
    physical: &str,
    vlan_id: u16,
) -> Result<UplinkSegment, SegmentError> {
    let name = segment_name(physical, vlan_id);
    let create_err = |msg: String| SegmentError::Create {
        name: name.clone(),
        msg,
    };

    let segment = UplinkSegment {
        physical: physical.to_string(),
        vlan_id,
        name: name.clone(),
    };

    if let Some(index) = links
        .index_of(&name)
        .await
        .map_err(|e| create_err(format!("{:#}", e)))?
    {
        info!(sl!(), "VLAN segment already present, skipping creation"; "segment" => &name);
        links
            .set_up(index)
            .await
            .map_err(|e| create_err(format!("{:#}", e)))?;
        return Ok(segment);
    }

    let parent = links
        .index_of(physical)
        .await
        .map_err(|e| create_err(format!("{:#}", e)))?
        .ok_or_else(|| create_err(format!("parent interface {} not found", physical)))?;

    links
        .create_vlan(&name, parent, vlan_id)
        .await
        .map_err(|e| create_err(format!("{:#}", e)))?;

    let index = links
        .index_of(&name)
        .await
        .map_err(|e| create_err(format!("{:#}", e)))?
        .ok_or_else(|| create_err("sub-interface missing after creation".to_string()))?;
    links
        .set_up(index)
        .await
        .map_err(|e| create_err(format!("{:#}", e)))?;

    info!(sl!(), "created VLAN segment"; "segment" => &name, "parent" => physical, "vlan" => vlan_id);
    Ok(segment)
}

/// Removes the segment's sub-interface. An already-absent sub-interface is
/// fine (repeated teardown must stay quiet); a failing delete is reported.
pub async fn teardown(links: &dyn LinkOps, segment: &UplinkSegment) -> Result<(), SegmentError> {
    let remove_err = |msg: String| SegmentError::Remove {
        name: segment.name.clone(),
        msg,
    };

    match links
        .index_of(&segment.name)
        .await
        .map_err(|e| remove_err(format!("{:#}", e)))?
    {
        Some(index) => {
            links
                .delete(index)
                .await
                .map_err(|e| remove_err(format!("{:#}", e)))?;
            info!(sl!(), "removed VLAN segment"; "segment" => &segment.name);
            Ok(())
        }
        None => {
            debug!(sl!(), "VLAN segment already absent"; "segment" => &segment.name);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_ops::LinkInfo;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeLinks {
        links: Mutex<HashMap<String, LinkInfo>>,
        next_index: AtomicU32,
        vlans_created: AtomicU32,
    }

    impl FakeLinks {
        fn with(names: &[(&str, &str)]) -> Self {
            let fake = FakeLinks::default();
            {
                let mut links = fake.links.lock().unwrap();
                for (i, (name, mac)) in names.iter().enumerate() {
                    links.insert(
                        name.to_string(),
                        LinkInfo {
                            name: name.to_string(),
                            index: i as u32 + 1,
                            mac: mac.to_string(),
                        },
                    );
                }
            }
            fake.next_index.store(names.len() as u32 + 1, Ordering::SeqCst);
            fake
        }

        fn contains(&self, name: &str) -> bool {
            self.links.lock().unwrap().contains_key(name)
        }
    }

    #[async_trait]
    impl LinkOps for FakeLinks {
        async fn index_of(&self, name: &str) -> Result<Option<u32>> {
            Ok(self.links.lock().unwrap().get(name).map(|l| l.index))
        }

        async fn create_vlan(&self, name: &str, _parent: u32, _vlan_id: u16) -> Result<()> {
            let index = self.next_index.fetch_add(1, Ordering::SeqCst);
            self.vlans_created.fetch_add(1, Ordering::SeqCst);
            self.links.lock().unwrap().insert(
                name.to_string(),
                LinkInfo {
                    name: name.to_string(),
                    index,
                    mac: String::new(),
                },
            );
            Ok(())
        }

        async fn set_up(&self, _index: u32) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, index: u32) -> Result<()> {
            self.links.lock().unwrap().retain(|_, l| l.index != index);
            Ok(())
        }

        async fn list(&self) -> Result<Vec<LinkInfo>> {
            Ok(self.links.lock().unwrap().values().cloned().collect())
        }
    }

    #[test]
    fn test_segment_name_is_deterministic() {
        assert_eq!(segment_name("eth0", 100), "eth0.100");
        assert_eq!(segment_name("eth0", 100), segment_name("eth0", 100));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let links = FakeLinks::with(&[("eth0", "aa:bb:cc:dd:ee:ff")]);

        let first = ensure(&links, "eth0", 100).await.unwrap();
        let second = ensure(&links, "eth0", 100).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(links.vlans_created.load(Ordering::SeqCst), 1);
        assert!(links.contains("eth0.100"));
    }

    #[tokio::test]
    async fn test_ensure_requires_parent() {
        let links = FakeLinks::default();
        assert!(matches!(
            ensure(&links, "eth9", 100).await,
            Err(SegmentError::Create { .. })
        ));
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let links = FakeLinks::with(&[("eth0", "aa:bb:cc:dd:ee:ff")]);
        let segment = ensure(&links, "eth0", 100).await.unwrap();

        teardown(&links, &segment).await.unwrap();
        assert!(!links.contains("eth0.100"));
        // Second teardown of an absent segment is a quiet no-op.
        teardown(&links, &segment).await.unwrap();
    }

    #[tokio::test]
    async fn test_resolve_by_name_and_mac() {
        let links = FakeLinks::with(&[("eth0", "aa:bb:cc:dd:ee:ff"), ("eth1", "11:22:33:44:55:66")]);

        let by_name = resolve(&links, &UplinkRef::Name("eth1".to_string())).await.unwrap();
        assert_eq!(by_name, "eth1");

        // MAC matching is case-insensitive.
        let by_mac = resolve(&links, &UplinkRef::Mac("AA:BB:CC:DD:EE:FF".to_string()))
            .await
            .unwrap();
        assert_eq!(by_mac, "eth0");

        assert!(matches!(
            resolve(&links, &UplinkRef::Name("eth7".to_string())).await,
            Err(ResolutionError::NoSuchInterface(_))
        ));
        assert!(matches!(
            resolve(&links, &UplinkRef::Mac("00:00:00:00:00:01".to_string())).await,
            Err(ResolutionError::MacNotMatched(_))
        ));
    }
}

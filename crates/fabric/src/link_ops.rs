// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Host link manipulation behind a trait, so the segmenter and uplink
//! resolution can be exercised without touching the running kernel.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use netlink_packet_route::link::LinkAttribute;
use scopeguard::defer;

use crate::mac;

/// One host network interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkInfo {
    pub name: String,
    pub index: u32,
    pub mac: String,
}

#[async_trait]
pub trait LinkOps: Send + Sync {
    /// Interface index for a name, `None` when absent.
    async fn index_of(&self, name: &str) -> Result<Option<u32>>;

    /// Creates an 802.1Q sub-interface on the parent link.
    async fn create_vlan(&self, name: &str, parent: u32, vlan_id: u16) -> Result<()>;

    /// Brings a link administratively up.
    async fn set_up(&self, index: u32) -> Result<()>;

    /// Deletes a link.
    async fn delete(&self, index: u32) -> Result<()>;

    /// Dumps all host links.
    async fn list(&self) -> Result<Vec<LinkInfo>>;
}

/// Real implementation on rtnetlink. Each call opens its own connection;
/// none of these operations is hot enough to justify a pooled handle.
#[derive(Debug, Default)]
pub struct NetlinkOps;

impl NetlinkOps {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LinkOps for NetlinkOps {
    async fn index_of(&self, name: &str) -> Result<Option<u32>> {
        let (connection, handle, _) =
            rtnetlink::new_connection().context("new netlink connection")?;
        let task = tokio::spawn(connection);
        defer!({
            task.abort();
        });

        let mut links = handle.link().get().match_name(name.to_string()).execute();
        match links.try_next().await {
            Ok(Some(msg)) => Ok(Some(msg.header.index)),
            // The kernel answers a dump for a missing name with an error.
            _ => Ok(None),
        }
    }

    async fn create_vlan(&self, name: &str, parent: u32, vlan_id: u16) -> Result<()> {
        let (connection, handle, _) =
            rtnetlink::new_connection().context("new netlink connection")?;
        let task = tokio::spawn(connection);
        defer!({
            task.abort();
        });

        handle
            .link()
            .add()
            .vlan(name.to_string(), parent, vlan_id)
            .execute()
            .await
            .with_context(|| format!("add vlan link {}", name))
    }

    async fn set_up(&self, index: u32) -> Result<()> {
        let (connection, handle, _) =
            rtnetlink::new_connection().context("new netlink connection")?;
        let task = tokio::spawn(connection);
        defer!({
            task.abort();
        });

        handle
            .link()
            .set(index)
            .up()
            .execute()
            .await
            .with_context(|| format!("set link {} up", index))
    }

    async fn delete(&self, index: u32) -> Result<()> {
        let (connection, handle, _) =
            rtnetlink::new_connection().context("new netlink connection")?;
        let task = tokio::spawn(connection);
        defer!({
            task.abort();
        });

        handle
            .link()
            .del(index)
            .execute()
            .await
            .with_context(|| format!("delete link {}", index))
    }

    async fn list(&self) -> Result<Vec<LinkInfo>> {
        let (connection, handle, _) =
            rtnetlink::new_connection().context("new netlink connection")?;
        let task = tokio::spawn(connection);
        defer!({
            task.abort();
        });

        let mut links = handle.link().get().execute();
        let mut infos = vec![];
        while let Some(msg) = links.try_next().await.context("dump links")? {
            let mut name = String::new();
            let mut addr = String::new();
            for attr in &msg.attributes {
                match attr {
                    LinkAttribute::IfName(n) => name = n.clone(),
                    LinkAttribute::Address(a) => {
                        if let Ok(m) = mac::format(a) {
                            addr = m;
                        }
                    }
                    _ => {}
                }
            }
            if !name.is_empty() {
                infos.push(LinkInfo {
                    name,
                    index: msg.header.index,
                    mac: addr,
                });
            }
        }
        Ok(infos)
    }
}

// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Container endpoints driven through podman, wired into the software
//! switch with a veth pair whose host side becomes an OVS port. The OVS
//! interface record carries `external_ids:container_id` so attachments are
//! rediscoverable without any local state.

use anyhow::{Context, Result};
use async_trait::async_trait;
use netcell_types::BackendKind;

use crate::cmd;
use crate::{Attachment, CreateSpec, Driver, EndpointError};

const PODMAN: &str = "podman";
const OVS_VSCTL: &str = "ovs-vsctl";
const IP: &str = "ip";
const NSENTER: &str = "nsenter";

// Linux interface names are capped at IFNAMSIZ - 1 bytes.
const MAX_IFNAME_LEN: usize = 15;

const GUEST_IFACE: &str = "eth0";

// FNV-1a, for interface names too long to carry the endpoint name.
fn name_digest(name: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in name.as_bytes() {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x100_0000_01b3);
    }
    h
}

fn bounded_name(prefix: &str, endpoint: &str) -> String {
    let name = format!("{}{}", prefix, endpoint);
    if name.len() <= MAX_IFNAME_LEN {
        return name;
    }
    // Truncation would collide (ep1 vs ep10); hash the whole endpoint name
    // instead so distinct endpoints always get distinct interfaces.
    format!("{}{:012x}", prefix, name_digest(endpoint) & 0xffff_ffff_ffff)
}

/// Deterministic host-side port name for a container endpoint.
pub fn port_name(endpoint: &str) -> String {
    bounded_name("vp-", endpoint)
}

fn peer_name(endpoint: &str) -> String {
    bounded_name("vc-", endpoint)
}

/// Drives container endpoints.
#[derive(Debug)]
pub struct ContainerDriver {
    bridge: String,
}

impl ContainerDriver {
    pub fn new(bridge: &str) -> Self {
        Self {
            bridge: bridge.to_string(),
        }
    }

    async fn pid_of(&self, name: &str) -> Result<String, EndpointError> {
        let out = cmd::output(PODMAN, &["inspect", "--format", "{{.State.Pid}}", name])
            .await
            .map_err(|_| EndpointError::NotRunning(name.to_string()))?;
        let pid = out.trim().to_string();
        if pid.is_empty() || pid == "0" {
            return Err(EndpointError::NotRunning(name.to_string()));
        }
        Ok(pid)
    }
}

#[async_trait]
impl Driver for ContainerDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Container
    }

    async fn create(&self, name: &str, spec: &CreateSpec) -> Result<()> {
        cmd::run(
            PODMAN,
            &[
                "run", "-d", "--name", name, "--hostname", name, "--network", "none", &spec.image,
            ],
        )
        .await
        .with_context(|| format!("run container {}", name))?;

        let pid = self.pid_of(name).await.context("resolve container pid")?;

        let port = port_name(name);
        let peer = peer_name(name);

        cmd::run(
            IP,
            &["link", "add", &port, "type", "veth", "peer", "name", &peer],
        )
        .await
        .with_context(|| format!("create veth pair for {}", name))?;

        cmd::run(
            OVS_VSCTL,
            &[
                "--may-exist",
                "add-port",
                &self.bridge,
                &port,
                "--",
                "set",
                "interface",
                &port,
                &format!("external_ids:container_id={}", name),
            ],
        )
        .await
        .with_context(|| format!("add switch port {}", port))?;
        cmd::run(IP, &["link", "set", &port, "up"]).await?;

        // Move the peer into the container namespace and apply the guest
        // network payload there.
        cmd::run(IP, &["link", "set", &peer, "netns", &pid])
            .await
            .with_context(|| format!("move {} into netns of {}", peer, name))?;

        let ns = ["-t", &pid, "-n"];
        let addr = format!("{}/{}", spec.net.address, spec.net.prefix_len);
        let gateway = spec.net.gateway.to_string();
        for args in [
            vec!["ip", "link", "set", &peer, "name", GUEST_IFACE],
            vec!["ip", "link", "set", GUEST_IFACE, "address", &spec.mac],
            vec!["ip", "addr", "add", &addr, "dev", GUEST_IFACE],
            vec!["ip", "link", "set", GUEST_IFACE, "up"],
            vec!["ip", "route", "add", "default", "via", &gateway],
        ] {
            let mut full: Vec<&str> = ns.to_vec();
            full.extend(args.iter());
            cmd::run(NSENTER, &full)
                .await
                .with_context(|| format!("configure guest interface of {}", name))?;
        }

        info!(sl!(), "created container endpoint"; "endpoint" => name, "port" => port);
        Ok(())
    }

    async fn destroy(&self, name: &str) -> Result<()> {
        let port = port_name(name);
        cmd::run_tolerant(OVS_VSCTL, &["--if-exists", "del-port", &port], &[])
            .await
            .with_context(|| format!("remove switch port {}", port))?;
        cmd::run_tolerant(IP, &["link", "del", &port], &["Cannot find device"])
            .await
            .with_context(|| format!("remove veth {}", port))?;
        cmd::run_tolerant(PODMAN, &["rm", "-f", name], &["no such container"])
            .await
            .with_context(|| format!("remove container {}", name))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let out = cmd::output(PODMAN, &["ps", "-a", "--format", "{{.Names}}"])
            .await
            .context("list containers")?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && l.starts_with(prefix))
            .map(str::to_string)
            .collect())
    }

    async fn running(&self, name: &str) -> Result<bool> {
        match cmd::output(PODMAN, &["inspect", "--format", "{{.State.Running}}", name]).await {
            Ok(out) => Ok(out.trim() == "true"),
            Err(_) => Ok(false),
        }
    }

    async fn attachment(&self, name: &str) -> Result<Attachment, EndpointError> {
        let out = cmd::output(
            OVS_VSCTL,
            &[
                "--no-heading",
                "--data=bare",
                "--columns=name",
                "find",
                "interface",
                &format!("external_ids:container_id={}", name),
            ],
        )
        .await
        .map_err(|e| EndpointError::Backend {
            op: "attachment",
            name: name.to_string(),
            msg: format!("{:#}", e),
        })?;

        let port = out.trim().to_string();
        if port.is_empty() {
            return Err(EndpointError::NotRunning(name.to_string()));
        }

        let pid = self.pid_of(name).await?;
        let mac = cmd::output(
            NSENTER,
            &[
                "-t",
                &pid,
                "-n",
                "cat",
                &format!("/sys/class/net/{}/address", GUEST_IFACE),
            ],
        )
        .await
        .map_err(|_| EndpointError::NotRunning(name.to_string()))?;

        Ok(Attachment {
            port,
            mac: mac.trim().to_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_name_is_deterministic_and_bounded() {
        assert_eq!(port_name("cell100-ep1"), "vp-cell100-ep1");
        assert_eq!(port_name("cell100-ep1"), port_name("cell100-ep1"));

        let long = port_name("averylongendpointname12345");
        assert!(long.len() <= MAX_IFNAME_LEN);
        assert_eq!(long, port_name("averylongendpointname12345"));
    }

    #[test]
    fn test_overlong_port_names_stay_distinct() {
        // "vp-cell4094-ep10" overflows IFNAMSIZ; plain truncation would
        // fold it onto ordinal 1's port.
        let short = port_name("cell4094-ep1");
        let long = port_name("cell4094-ep10");
        assert_ne!(short, long);
        assert!(short.len() <= MAX_IFNAME_LEN);
        assert!(long.len() <= MAX_IFNAME_LEN);
    }
}

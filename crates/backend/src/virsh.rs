// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! VM endpoints driven through the libvirt CLI.

use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;
use netcell_types::BackendKind;

use crate::cmd;
use crate::{Attachment, CreateSpec, Driver, EndpointError};

const VIRSH: &str = "virsh";

// Modest fixed sizing; endpoints are throwaway tenants, not pets.
const VM_MEMORY_MIB: u32 = 512;
const VM_VCPUS: u32 = 1;

/// Drives VM endpoints as transient libvirt domains.
#[derive(Debug)]
pub struct VirshDriver {
    bridge: String,
}

impl VirshDriver {
    pub fn new(bridge: &str) -> Self {
        Self {
            bridge: bridge.to_string(),
        }
    }

    fn domain_xml(&self, name: &str, spec: &CreateSpec) -> String {
        format!(
            r#"<domain type='kvm'>
  <name>{name}</name>
  <memory unit='MiB'>{memory}</memory>
  <vcpu>{vcpus}</vcpu>
  <os><type arch='x86_64'>hvm</type><boot dev='hd'/></os>
  <devices>
    <disk type='file' device='disk'>
      <driver name='qemu' type='qcow2'/>
      <source file='{image}'/>
      <target dev='vda' bus='virtio'/>
    </disk>
    <interface type='bridge'>
      <source bridge='{bridge}'/>
      <virtualport type='openvswitch'/>
      <mac address='{mac}'/>
      <model type='virtio'/>
    </interface>
    <console type='pty'/>
  </devices>
</domain>
"#,
            name = name,
            memory = VM_MEMORY_MIB,
            vcpus = VM_VCPUS,
            image = spec.image,
            bridge = self.bridge,
            mac = spec.mac,
        )
    }
}

#[async_trait]
impl Driver for VirshDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Vm
    }

    async fn create(&self, name: &str, spec: &CreateSpec) -> Result<()> {
        let xml = self.domain_xml(name, spec);
        let mut file = tempfile::NamedTempFile::new().context("create domain xml file")?;
        file.write_all(xml.as_bytes()).context("write domain xml")?;
        let path = file.path().to_string_lossy().into_owned();

        // Guest IP/gateway injection is the guest-config provider's job
        // (cloud-init or similar baked into the image); the driver only
        // wires the interface.
        debug!(sl!(), "guest net config"; "endpoint" => name, "address" => format!("{}/{}", spec.net.address, spec.net.prefix_len), "gateway" => spec.net.gateway.to_string());

        cmd::run(VIRSH, &["create", &path])
            .await
            .with_context(|| format!("create domain {}", name))?;
        info!(sl!(), "created VM endpoint"; "endpoint" => name);
        Ok(())
    }

    async fn destroy(&self, name: &str) -> Result<()> {
        cmd::run_tolerant(
            VIRSH,
            &["destroy", name],
            &["failed to get domain", "domain is not running"],
        )
        .await
        .with_context(|| format!("destroy domain {}", name))?;

        // Transient domains vanish on destroy; defined ones need undefine.
        cmd::run_tolerant(
            VIRSH,
            &["undefine", name],
            &["failed to get domain", "cannot undefine transient domain"],
        )
        .await
        .with_context(|| format!("undefine domain {}", name))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let out = cmd::output(VIRSH, &["list", "--all", "--name"])
            .await
            .context("list domains")?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && l.starts_with(prefix))
            .map(str::to_string)
            .collect())
    }

    async fn running(&self, name: &str) -> Result<bool> {
        match cmd::output(VIRSH, &["domstate", name]).await {
            Ok(state) => Ok(state.trim() == "running"),
            Err(_) => Ok(false),
        }
    }

    async fn attachment(&self, name: &str) -> Result<Attachment, EndpointError> {
        let out = cmd::output(VIRSH, &["domiflist", name])
            .await
            .map_err(|_| EndpointError::NotRunning(name.to_string()))?;

        parse_domiflist(&out, &self.bridge).ok_or_else(|| EndpointError::NotRunning(name.to_string()))
    }
}

/// Picks the first interface row bound to `bridge` out of `virsh domiflist`
/// output. Rows whose interface is "-" (device not yet created) are skipped.
fn parse_domiflist(out: &str, bridge: &str) -> Option<Attachment> {
    out.lines()
        .skip_while(|l| !l.trim_start().starts_with('-'))
        .skip(1)
        .filter_map(|l| {
            let cols: Vec<&str> = l.split_whitespace().collect();
            if cols.len() < 5 || cols[0] == "-" || cols[2] != bridge {
                return None;
            }
            Some(Attachment {
                port: cols[0].to_string(),
                mac: cols[4].to_lowercase(),
            })
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GuestNetConfig;

    const DOMIFLIST: &str = r#" Interface   Type     Source    Model    MAC
-------------------------------------------------------
 vnet3       bridge   cellbr0   virtio   52:54:00:64:00:01
 vnet4       bridge   virbr0    virtio   52:54:00:aa:bb:cc
"#;

    #[test]
    fn test_parse_domiflist_filters_by_bridge() {
        let att = parse_domiflist(DOMIFLIST, "cellbr0").unwrap();
        assert_eq!(att.port, "vnet3");
        assert_eq!(att.mac, "52:54:00:64:00:01");

        assert!(parse_domiflist(DOMIFLIST, "missingbr").is_none());
    }

    #[test]
    fn test_parse_domiflist_skips_unbound_rows() {
        let out = r#" Interface   Type     Source    Model    MAC
----------------------------------------------------
 -           bridge   cellbr0   virtio   52:54:00:64:00:01
"#;
        assert!(parse_domiflist(out, "cellbr0").is_none());
    }

    #[test]
    fn test_domain_xml_wires_bridge_and_mac() {
        let driver = VirshDriver::new("cellbr0");
        let spec = CreateSpec {
            image: "/var/lib/netcell/base.qcow2".to_string(),
            bridge: "cellbr0".to_string(),
            mac: "52:54:00:64:00:01".to_string(),
            net: GuestNetConfig {
                address: "192.168.10.11".parse().unwrap(),
                prefix_len: 24,
                gateway: "192.168.10.1".parse().unwrap(),
            },
        };
        let xml = driver.domain_xml("cell100-ep1", &spec);
        assert!(xml.contains("<name>cell100-ep1</name>"));
        assert!(xml.contains("<source bridge='cellbr0'/>"));
        assert!(xml.contains("<virtualport type='openvswitch'/>"));
        assert!(xml.contains("<mac address='52:54:00:64:00:01'/>"));
    }
}

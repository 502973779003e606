// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Software switch operations behind a trait; the real implementation
//! drives Open vSwitch through its CLIs.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

const OVS_VSCTL: &str = "ovs-vsctl";
const OVS_OFCTL: &str = "ovs-ofctl";

#[async_trait]
pub trait SwitchOps: Send + Sync {
    /// Creates the bridge if it does not exist.
    async fn ensure_bridge(&self, bridge: &str) -> Result<()>;

    /// Adds a port to the bridge (no-op when already attached).
    async fn add_port(&self, bridge: &str, port: &str) -> Result<()>;

    /// Removes a port from the bridge (no-op when already gone).
    async fn del_port(&self, bridge: &str, port: &str) -> Result<()>;

    /// Installs one flow given in OpenFlow text form.
    async fn add_flow(&self, bridge: &str, flow: &str) -> Result<()>;

    /// Removes all flows matching the given spec.
    async fn del_flows(&self, bridge: &str, spec: &str) -> Result<()>;

    /// Dumps the bridge's flow table, one flow per line.
    async fn dump_flows(&self, bridge: &str) -> Result<Vec<String>>;
}

/// Open vSwitch implementation.
#[derive(Debug, Default)]
pub struct OvsSwitch;

impl OvsSwitch {
    pub fn new() -> Self {
        Self
    }

    async fn exec(&self, bin: &str, args: &[&str]) -> Result<String> {
        debug!(sl!(), "exec"; "bin" => bin, "args" => format!("{:?}", args));
        let out = Command::new(bin)
            .args(args)
            .output()
            .await
            .with_context(|| format!("spawn {}", bin))?;
        if !out.status.success() {
            return Err(anyhow!(
                "{} {} failed: {}",
                bin,
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[async_trait]
impl SwitchOps for OvsSwitch {
    async fn ensure_bridge(&self, bridge: &str) -> Result<()> {
        self.exec(OVS_VSCTL, &["--may-exist", "add-br", bridge])
            .await
            .map(|_| ())
    }

    async fn add_port(&self, bridge: &str, port: &str) -> Result<()> {
        self.exec(OVS_VSCTL, &["--may-exist", "add-port", bridge, port])
            .await
            .map(|_| ())
    }

    async fn del_port(&self, bridge: &str, port: &str) -> Result<()> {
        self.exec(OVS_VSCTL, &["--if-exists", "del-port", bridge, port])
            .await
            .map(|_| ())
    }

    async fn add_flow(&self, bridge: &str, flow: &str) -> Result<()> {
        self.exec(OVS_OFCTL, &["add-flow", bridge, flow])
            .await
            .map(|_| ())
    }

    async fn del_flows(&self, bridge: &str, spec: &str) -> Result<()> {
        self.exec(OVS_OFCTL, &["del-flows", bridge, spec])
            .await
            .map(|_| ())
    }

    async fn dump_flows(&self, bridge: &str) -> Result<Vec<String>> {
        let out = self.exec(OVS_OFCTL, &["dump-flows", bridge]).await?;
        Ok(out
            .lines()
            .map(str::trim)
            // First line is the NXST_FLOW reply header.
            .filter(|l| !l.is_empty() && !l.starts_with("NXST_FLOW") && !l.starts_with("OFPST_FLOW"))
            .map(str::to_string)
            .collect())
    }
}

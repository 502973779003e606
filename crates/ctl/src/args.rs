// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

use netcell_types::{BackendKind, CellConfig, Profile, UplinkRef, DEFAULT_BRIDGE};

#[derive(Parser, Debug)]
#[clap(
    name = "netcell-ctl",
    author,
    about = "Provision and tear down isolated endpoint cells"
)]
pub struct NetcellCtlCli {
    /// Log level (trace, debug, info, warning, error, critical)
    #[clap(short, long, default_value = "info")]
    pub log_level: String,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Bring a cell up: VLAN segment, endpoints, isolation flow pairs
    Start(CellArgs),

    /// Tear a cell down, best-effort, in reverse order
    Stop(CellArgs),
}

#[derive(Debug, Args)]
pub struct CellArgs {
    /// Physical uplink interface name
    #[clap(long, required_unless_present = "uplink_mac", conflicts_with = "uplink_mac")]
    pub uplink: Option<String>,

    /// Physical uplink MAC address, resolved to an interface name
    #[clap(long)]
    pub uplink_mac: Option<String>,

    /// 802.1Q VLAN id carrying the cell's traffic
    #[clap(long)]
    pub vlan: u16,

    /// Cell subnet in CIDR form, e.g. 192.168.10.0/24
    #[clap(long)]
    pub subnet: String,

    /// Number of endpoints to provision
    #[clap(long, default_value_t = 1)]
    pub count: u32,

    /// Endpoint backend (vm, container)
    #[clap(long, default_value = "vm")]
    pub backend: BackendKind,

    /// Endpoint name prefix; defaults to a VLAN-derived prefix
    #[clap(long)]
    pub prefix: Option<String>,

    /// Deployment profile fixing the first endpoint host offset
    #[clap(long, default_value = "default")]
    pub profile: Profile,

    /// Explicit first host offset, overriding the profile
    #[clap(long)]
    pub offset: Option<u8>,

    /// Software switch bridge the cell is wired through
    #[clap(long, default_value = DEFAULT_BRIDGE)]
    pub bridge: String,

    /// Base image reference handed to the backend driver; required to
    /// start a cell, unused when stopping one
    #[clap(long)]
    pub image: Option<String>,
}

impl CellArgs {
    pub fn cell_config(&self) -> Result<CellConfig> {
        let uplink = match (&self.uplink, &self.uplink_mac) {
            (Some(name), None) => UplinkRef::Name(name.clone()),
            (None, Some(mac)) => UplinkRef::Mac(mac.clone()),
            _ => return Err(anyhow!("exactly one of --uplink and --uplink-mac is required")),
        };

        Ok(CellConfig {
            uplink,
            vlan_id: self.vlan,
            subnet: self.subnet.clone(),
            count: self.count,
            backend: self.backend,
            prefix: self.prefix.clone(),
            offset: self.offset.unwrap_or_else(|| self.profile.host_offset()),
            bridge: self.bridge.clone(),
            image: self.image.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &[&str]) -> NetcellCtlCli {
        NetcellCtlCli::try_parse_from(line).unwrap()
    }

    #[test]
    fn test_start_by_uplink_name() {
        let cli = parse(&[
            "netcell-ctl",
            "start",
            "--uplink",
            "eth0",
            "--vlan",
            "100",
            "--subnet",
            "192.168.10.0/24",
            "--count",
            "3",
        ]);

        let args = match cli.command {
            Commands::Start(a) => a,
            other => panic!("unexpected command {:?}", other),
        };
        let config = args.cell_config().unwrap();
        assert_eq!(config.uplink, UplinkRef::Name("eth0".to_string()));
        assert_eq!(config.vlan_id, 100);
        assert_eq!(config.count, 3);
        assert_eq!(config.offset, Profile::Default.host_offset());
        assert_eq!(config.bridge, DEFAULT_BRIDGE);
    }

    #[test]
    fn test_uplink_by_mac_and_profile() {
        let cli = parse(&[
            "netcell-ctl",
            "stop",
            "--uplink-mac",
            "aa:bb:cc:dd:ee:ff",
            "--vlan",
            "200",
            "--subnet",
            "10.0.0.0/24",
            "--profile",
            "lab",
            "--backend",
            "container",
        ]);

        let args = match cli.command {
            Commands::Stop(a) => a,
            other => panic!("unexpected command {:?}", other),
        };
        let config = args.cell_config().unwrap();
        assert_eq!(config.uplink, UplinkRef::Mac("aa:bb:cc:dd:ee:ff".to_string()));
        assert_eq!(config.backend, BackendKind::Container);
        assert_eq!(config.offset, Profile::Lab.host_offset());
    }

    #[test]
    fn test_explicit_offset_overrides_profile() {
        let cli = parse(&[
            "netcell-ctl",
            "start",
            "--uplink",
            "eth0",
            "--vlan",
            "100",
            "--subnet",
            "10.0.0.0/24",
            "--profile",
            "prod",
            "--offset",
            "50",
        ]);

        let args = match cli.command {
            Commands::Start(a) => a,
            other => panic!("unexpected command {:?}", other),
        };
        assert_eq!(args.cell_config().unwrap().offset, 50);
    }

    #[test]
    fn test_non_numeric_vlan_rejected() {
        assert!(NetcellCtlCli::try_parse_from([
            "netcell-ctl",
            "start",
            "--uplink",
            "eth0",
            "--vlan",
            "hundred",
            "--subnet",
            "10.0.0.0/24",
        ])
        .is_err());
    }

    #[test]
    fn test_uplink_flags_are_exclusive() {
        assert!(NetcellCtlCli::try_parse_from([
            "netcell-ctl",
            "start",
            "--uplink",
            "eth0",
            "--uplink-mac",
            "aa:bb:cc:dd:ee:ff",
            "--vlan",
            "100",
            "--subnet",
            "10.0.0.0/24",
        ])
        .is_err());

        // One of the two is mandatory.
        assert!(NetcellCtlCli::try_parse_from([
            "netcell-ctl",
            "start",
            "--vlan",
            "100",
            "--subnet",
            "10.0.0.0/24",
        ])
        .is_err());
    }
}

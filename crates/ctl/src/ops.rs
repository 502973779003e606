// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::sync::Arc;

use anyhow::{anyhow, Result};

use backend::new_driver;
use fabric::{NetlinkOps, OvsSwitch};
use lifecycle::Orchestrator;

use crate::args::CellArgs;

fn build(args: &CellArgs) -> Result<Orchestrator> {
    let config = args.cell_config()?;
    let driver = new_driver(config.backend, &config.bridge);
    let orchestrator = Orchestrator::new(
        config,
        driver,
        Arc::new(NetlinkOps::new()),
        Arc::new(OvsSwitch::new()),
    )?;
    Ok(orchestrator)
}

pub async fn handle_start(args: CellArgs) -> Result<()> {
    if args.image.as_deref().unwrap_or("").is_empty() {
        return Err(anyhow!("--image is required to start a cell"));
    }
    let report = build(&args)?.start().await?;

    println!("segment:  {}", report.segment.name);
    println!("gateway:  {}", report.gateway);
    for ep in &report.endpoints {
        match (&ep.attachment, &ep.error) {
            (Some(att), None) => {
                println!("endpoint: {} {} port {} mac {}", ep.name, ep.address, att.port, att.mac)
            }
            (_, Some(err)) => println!("endpoint: {} {} FAILED: {}", ep.name, ep.address, err),
            (None, None) => println!("endpoint: {} {} FAILED: no attachment", ep.name, ep.address),
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        return Err(anyhow!("{} of {} endpoints are not isolated", failed, report.endpoints.len()));
    }
    Ok(())
}

pub async fn handle_stop(args: CellArgs) -> Result<()> {
    let report = build(&args)?.stop().await?;

    println!("flows revoked:    {}", report.flows_revoked);
    println!("segment removed:  {}", report.segment_removed);
    for name in &report.removed_endpoints {
        println!("endpoint removed: {}", name);
    }
    for failure in &report.failures {
        println!("failed:           {}", failure);
    }

    if !report.clean() {
        return Err(anyhow!("teardown finished with {} failures", report.failures.len()));
    }
    Ok(())
}

// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;

use backend::{CreateSpec, Driver, GuestNetConfig};
use fabric::flows::IsolationPair;
use fabric::uplink::{self, UplinkSegment};
use fabric::{mac, reconcile, EndpointRegistry, FlowApplier, LinkOps, SubnetPlan, SwitchOps};
use netcell_types::{CellConfig, ValidationError};

use crate::guard::SegmentGuard;
use crate::report::{EndpointStatus, StartReport, StopReport};

const ATTACH_ATTEMPTS: u32 = 10;
const ATTACH_DELAY: Duration = Duration::from_millis(500);

/// Lifecycle states of a cell. `start` walks forward through them; `stop`
/// walks backward, best-effort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CellState {
    Idle,
    SegmentReady,
    EndpointsReady,
    FlowsApplied,
}

/// Drives the create/destroy lifecycle of one cell.
pub struct Orchestrator {
    config: CellConfig,
    plan: SubnetPlan,
    driver: Arc<dyn Driver>,
    links: Arc<dyn LinkOps>,
    switch: Arc<dyn SwitchOps>,
    applier: FlowApplier,
    registry: EndpointRegistry,
    attach_attempts: u32,
    attach_delay: Duration,
}

impl Orchestrator {
    /// Validates the configuration and builds the orchestrator. Validation
    /// failures surface here, before anything on the host is touched.
    pub fn new(
        config: CellConfig,
        driver: Arc<dyn Driver>,
        links: Arc<dyn LinkOps>,
        switch: Arc<dyn SwitchOps>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let plan = SubnetPlan::new(&config.subnet, config.offset)?;
        let applier = FlowApplier::new(switch.clone(), &config.bridge);
        let registry = EndpointRegistry::new(driver.clone());
        Ok(Self {
            config,
            plan,
            driver,
            links,
            switch,
            applier,
            registry,
            attach_attempts: ATTACH_ATTEMPTS,
            attach_delay: ATTACH_DELAY,
        })
    }

    /// Overrides the attachment retry budget.
    pub fn with_attach_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.attach_attempts = attempts;
        self.attach_delay = delay;
        self
    }

    fn transition(&self, from: CellState, to: CellState) -> CellState {
        debug!(sl!(), "state transition"; "from" => format!("{:?}", from), "to" => format!("{:?}", to));
        to
    }

    fn create_spec(&self, ordinal: u32) -> Result<CreateSpec> {
        Ok(CreateSpec {
            image: self.config.image.clone(),
            bridge: self.config.bridge.clone(),
            mac: mac::synthesize(self.config.vlan_id, ordinal),
            net: GuestNetConfig {
                address: self.plan.endpoint_ip(ordinal)?,
                prefix_len: self.plan.prefix(),
                gateway: self.plan.gateway(),
            },
        })
    }

    /// Brings the cell up: segment, endpoints, isolation flows.
    pub async fn start(&self) -> Result<StartReport> {
        let vlan_id = self.config.vlan_id;
        let prefix = self.config.endpoint_prefix();

        // Resolution happens before any mutation; a failure here needs no
        // unwinding.
        let physical = uplink::resolve(self.links.as_ref(), &self.config.uplink).await?;
        let _guard = SegmentGuard::acquire(&physical, vlan_id)?;

        let mut state = CellState::Idle;

        self.switch
            .ensure_bridge(&self.config.bridge)
            .await
            .context("ensure bridge")?;

        // Stale pairs from a previous run must go before anything is
        // recreated: port names and MACs do not survive re-creation.
        self.applier.revoke_all().await.context("revoke stale flows")?;

        let segment = uplink::ensure(self.links.as_ref(), &physical, vlan_id).await?;
        self.switch
            .add_port(&self.config.bridge, &segment.name)
            .await
            .context("attach segment to bridge")?;
        state = self.transition(state, CellState::SegmentReady);

        let desired: Vec<String> = (1..=self.config.count)
            .map(|i| self.config.endpoint_name(i))
            .collect();
        let addresses: Vec<Ipv4Addr> = (1..=self.config.count)
            .map(|i| self.plan.endpoint_ip(i))
            .collect::<Result<_, _>>()?;

        let observed = self.registry.list(&prefix).await?;
        let actions = reconcile::diff(&desired, &observed);

        // Strays from a previous run with a larger count are not part of
        // the desired set and go away first.
        for name in &actions.remove {
            if let Err(e) = self.driver.destroy(name).await {
                warn!(sl!(), "failed to remove stray endpoint"; "endpoint" => name, "error" => format!("{:#}", e));
            }
        }

        self.create_endpoints(&desired, &actions.create).await?;
        state = self.transition(state, CellState::EndpointsReady);

        let endpoints = join_all(desired.iter().enumerate().map(|(idx, name)| {
            let segment_port = segment.name.clone();
            let address = addresses[idx];
            async move { self.isolate_endpoint(name, address, &segment_port).await }
        }))
        .await;

        for failed in endpoints.iter().filter(|e| !e.isolated()) {
            warn!(sl!(), "endpoint is not isolated";
                "endpoint" => &failed.name,
                "error" => failed.error.as_deref().unwrap_or("unknown"));
        }
        let _ = self.transition(state, CellState::FlowsApplied);

        Ok(StartReport {
            segment,
            gateway: self.plan.gateway(),
            endpoints,
        })
    }

    /// Creates the missing endpoints, one task per ordinal. Any failure
    /// unwinds the endpoints created by this run and aborts; partially
    /// provisioned cells are not left running.
    async fn create_endpoints(&self, desired: &[String], to_create: &[String]) -> Result<()> {
        let create_set: HashSet<&String> = to_create.iter().collect();

        let results = join_all(desired.iter().enumerate().filter_map(|(idx, name)| {
            if !create_set.contains(name) {
                return None;
            }
            let ordinal = idx as u32 + 1;
            let driver = self.driver.clone();
            Some(async move {
                let result = match self.create_spec(ordinal) {
                    Ok(spec) => driver.create(name, &spec).await,
                    Err(e) => Err(e),
                };
                (name.clone(), result)
            })
        }))
        .await;

        let mut created = vec![];
        let mut failed = vec![];
        let mut first_failure: Option<(String, anyhow::Error)> = None;
        for (name, result) in results {
            match result {
                Ok(()) => created.push(name),
                Err(e) => {
                    error!(sl!(), "endpoint creation failed"; "endpoint" => &name, "error" => format!("{:#}", e));
                    if first_failure.is_none() {
                        first_failure = Some((name.clone(), e));
                    }
                    failed.push(name);
                }
            }
        }

        if let Some((name, e)) = first_failure {
            // A failed create may itself have left partial work behind,
            // e.g. a running container whose switch wiring never finished,
            // so the failed names are swept along with the completed ones.
            for n in created.iter().chain(failed.iter()) {
                if let Err(de) = self.driver.destroy(n).await {
                    warn!(sl!(), "rollback destroy failed"; "endpoint" => n, "error" => format!("{:#}", de));
                }
            }
            return Err(e).with_context(|| format!("create endpoint {}", name));
        }
        Ok(())
    }

    /// Resolves one endpoint's attachment (with bounded retry) and installs
    /// its isolation pair. Failures stay confined to this endpoint.
    async fn isolate_endpoint(
        &self,
        name: &str,
        address: Ipv4Addr,
        segment_port: &str,
    ) -> EndpointStatus {
        let attachment = match self
            .registry
            .wait_attachment(name, self.attach_attempts, self.attach_delay)
            .await
        {
            Ok(att) => att,
            Err(e) => {
                return EndpointStatus {
                    name: name.to_string(),
                    address,
                    attachment: None,
                    error: Some(format!("{:#}", e)),
                }
            }
        };

        let pair = IsolationPair::compile(segment_port, &attachment.port, &attachment.mac);
        let error = match self.applier.apply(std::slice::from_ref(&pair)).await {
            Ok(()) => None,
            Err(e) => Some(format!("{:#}", e)),
        };

        EndpointStatus {
            name: name.to_string(),
            address,
            attachment: Some(attachment),
            error,
        }
    }

    /// Tears the cell down. Every step runs even when earlier ones fail;
    /// failures are logged and aggregated, and a repeated stop is a quiet
    /// no-op.
    pub async fn stop(&self) -> Result<StopReport> {
        let vlan_id = self.config.vlan_id;
        let prefix = self.config.endpoint_prefix();
        let mut report = StopReport::default();

        let physical = match uplink::resolve(self.links.as_ref(), &self.config.uplink).await {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(sl!(), "uplink resolution failed during stop"; "error" => format!("{:#}", e));
                report.failures.push(format!("resolve uplink: {:#}", e));
                None
            }
        };

        let _guard = match &physical {
            Some(p) => Some(SegmentGuard::acquire(p, vlan_id)?),
            None => None,
        };

        // Flows first: rules must never outlive the endpoints they point at.
        match self.applier.revoke_all().await {
            Ok(()) => report.flows_revoked = true,
            Err(e) => {
                error!(sl!(), "flow revocation failed"; "error" => format!("{:#}", e));
                report.failures.push(format!("revoke flows: {:#}", e));
            }
        }

        // Endpoints are rediscovered from the live inventory, never from
        // remembered names.
        match self.registry.list(&prefix).await {
            Ok(names) => {
                for name in names {
                    match self.driver.destroy(&name).await {
                        Ok(()) => {
                            info!(sl!(), "destroyed endpoint"; "endpoint" => &name);
                            report.removed_endpoints.push(name);
                        }
                        Err(e) => {
                            error!(sl!(), "endpoint destroy failed"; "endpoint" => &name, "error" => format!("{:#}", e));
                            report.failures.push(format!("destroy {}: {:#}", name, e));
                        }
                    }
                }
            }
            Err(e) => {
                error!(sl!(), "endpoint listing failed during stop"; "error" => format!("{:#}", e));
                report.failures.push(format!("list endpoints: {:#}", e));
            }
        }

        // Segment last, after nothing references it anymore.
        if let Some(physical) = physical {
            let segment = UplinkSegment {
                physical: physical.clone(),
                vlan_id,
                name: uplink::segment_name(&physical, vlan_id),
            };
            if let Err(e) = self.switch.del_port(&self.config.bridge, &segment.name).await {
                warn!(sl!(), "segment port removal failed"; "port" => &segment.name, "error" => format!("{:#}", e));
                report.failures.push(format!("del-port {}: {:#}", segment.name, e));
            }
            match uplink::teardown(self.links.as_ref(), &segment).await {
                Ok(()) => report.segment_removed = true,
                Err(e) => {
                    error!(sl!(), "segment teardown failed"; "segment" => &segment.name, "error" => format!("{:#}", e));
                    report.failures.push(format!("teardown {}: {:#}", segment.name, e));
                }
            }
        }

        Ok(report)
    }
}

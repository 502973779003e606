// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Installs and revokes compiled isolation pairs against the software
//! switch. All table mutations are serialized behind one lock; different
//! endpoints' pairs may be prepared concurrently but never written
//! concurrently.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;

use super::{all_managed_spec, IsolationPair};
use crate::switch::SwitchOps;

const INSTALL_ATTEMPTS: u32 = 3;
const INSTALL_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("failed to install flow {spec} on {bridge}: {msg}")]
    Install {
        bridge: String,
        spec: String,
        msg: String,
    },

    #[error("failed to remove flows {spec} on {bridge}: {msg}")]
    Remove {
        bridge: String,
        spec: String,
        msg: String,
    },
}

pub struct FlowApplier {
    switch: Arc<dyn SwitchOps>,
    bridge: String,
    table_lock: Mutex<()>,
}

impl FlowApplier {
    pub fn new(switch: Arc<dyn SwitchOps>, bridge: &str) -> Self {
        Self {
            switch,
            bridge: bridge.to_string(),
            table_lock: Mutex::new(()),
        }
    }

    async fn install(&self, spec: &str) -> Result<(), FlowError> {
        let mut last = String::new();
        for attempt in 1..=INSTALL_ATTEMPTS {
            match self.switch.add_flow(&self.bridge, spec).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last = format!("{:#}", e);
                    warn!(sl!(), "flow install failed, retrying";
                        "bridge" => &self.bridge, "spec" => spec,
                        "attempt" => attempt, "error" => &last);
                    sleep(INSTALL_RETRY_DELAY).await;
                }
            }
        }
        Err(FlowError::Install {
            bridge: self.bridge.clone(),
            spec: spec.to_string(),
            msg: last,
        })
    }

    /// Installs the given isolation pairs.
    pub async fn apply(&self, pairs: &[IsolationPair]) -> Result<(), FlowError> {
        let _guard = self.table_lock.lock().await;
        for pair in pairs {
            self.install(&pair.outbound.add_spec()).await?;
            self.install(&pair.inbound.add_spec()).await?;
        }
        Ok(())
    }

    /// Removes exactly the given endpoint's pair.
    pub async fn revoke(&self, pair: &IsolationPair) -> Result<(), FlowError> {
        let _guard = self.table_lock.lock().await;
        for spec in pair.revoke_specs() {
            self.switch
                .del_flows(&self.bridge, &spec)
                .await
                .map_err(|e| FlowError::Remove {
                    bridge: self.bridge.clone(),
                    spec: spec.clone(),
                    msg: format!("{:#}", e),
                })?;
        }
        Ok(())
    }

    /// Removes every rule carrying the management cookie. Run first on
    /// every start: port names and MACs are not stable across endpoint
    /// re-creation, so stale pairs from a previous run must not survive.
    pub async fn revoke_all(&self) -> Result<(), FlowError> {
        let _guard = self.table_lock.lock().await;
        let spec = all_managed_spec();
        self.switch
            .del_flows(&self.bridge, &spec)
            .await
            .map_err(|e| FlowError::Remove {
                bridge: self.bridge.clone(),
                spec,
                msg: format!("{:#}", e),
            })
    }

    /// Dumps the rules carrying the management cookie.
    pub async fn managed_flows(&self) -> Result<Vec<String>, FlowError> {
        let cookie = format!("cookie={:#x}", super::FLOW_COOKIE);
        let flows = self
            .switch
            .dump_flows(&self.bridge)
            .await
            .map_err(|e| FlowError::Remove {
                bridge: self.bridge.clone(),
                spec: "dump".to_string(),
                msg: format!("{:#}", e),
            })?;
        Ok(flows.into_iter().filter(|f| f.contains(&cookie)).collect())
    }
}

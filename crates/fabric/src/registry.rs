// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Read-through endpoint registry. Nothing is cached between calls: the
//! live backend inventory is the only source of truth, re-derived on every
//! invocation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backend::{Attachment, Driver, EndpointError};
use tokio::time::sleep;

pub struct EndpointRegistry {
    driver: Arc<dyn Driver>,
}

impl EndpointRegistry {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Live endpoint names matching the managed prefix.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.driver
            .list(prefix)
            .await
            .with_context(|| format!("list endpoints with prefix {}", prefix))
    }

    /// The endpoint's current switch attachment.
    pub async fn attachment(&self, name: &str) -> Result<Attachment, EndpointError> {
        self.driver.attachment(name).await
    }

    /// Waits for the endpoint's attachment to appear, retrying a bounded
    /// number of times on "not running". Anything else is immediately fatal
    /// for this endpoint.
    pub async fn wait_attachment(
        &self,
        name: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<Attachment, EndpointError> {
        let mut tried = 0;
        loop {
            match self.driver.attachment(name).await {
                Ok(att) => return Ok(att),
                Err(EndpointError::NotRunning(_)) if tried + 1 < attempts => {
                    tried += 1;
                    debug!(sl!(), "attachment not ready, retrying";
                        "endpoint" => name, "attempt" => tried);
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use backend::CreateSpec;
    use netcell_types::BackendKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Driver whose attachment becomes visible only after a number of polls.
    struct SlowDriver {
        ready_after: u32,
        polls: AtomicU32,
    }

    #[async_trait]
    impl Driver for SlowDriver {
        fn kind(&self) -> BackendKind {
            BackendKind::Vm
        }

        async fn create(&self, _name: &str, _spec: &CreateSpec) -> Result<()> {
            Ok(())
        }

        async fn destroy(&self, _name: &str) -> Result<()> {
            Ok(())
        }

        async fn list(&self, _prefix: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }

        async fn running(&self, _name: &str) -> Result<bool> {
            Ok(true)
        }

        async fn attachment(&self, name: &str) -> Result<Attachment, EndpointError> {
            if self.polls.fetch_add(1, Ordering::SeqCst) < self.ready_after {
                return Err(EndpointError::NotRunning(name.to_string()));
            }
            Ok(Attachment {
                port: format!("vnet-{}", name),
                mac: "52:54:00:64:00:01".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_wait_attachment_retries_until_ready() {
        let registry = EndpointRegistry::new(Arc::new(SlowDriver {
            ready_after: 2,
            polls: AtomicU32::new(0),
        }));

        let att = registry
            .wait_attachment("ep1", 5, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(att.port, "vnet-ep1");
    }

    #[tokio::test]
    async fn test_wait_attachment_exhausts_budget() {
        let registry = EndpointRegistry::new(Arc::new(SlowDriver {
            ready_after: 10,
            polls: AtomicU32::new(0),
        }));

        let err = registry
            .wait_attachment("ep1", 3, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EndpointError::NotRunning(_)));
    }
}

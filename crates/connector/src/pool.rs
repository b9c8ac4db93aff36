//! Per-run connector pool.
//!
//! A session is established once per host per run and shared by every step
//! targeting that host. Pools are scoped to a single pipeline run and never
//! shared across runs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ConnectorError;
use crate::{Connector, ConnectorFactory};

pub struct ConnectorPool {
    factory: Arc<dyn ConnectorFactory>,
    active: Mutex<HashMap<String, Arc<dyn Connector>>>,
}

impl ConnectorPool {
    pub fn new(factory: Arc<dyn ConnectorFactory>) -> Self {
        Self {
            factory,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Get the host's session, establishing it on first use.
    pub async fn get(
        &self,
        host: &config::HostSpec,
    ) -> Result<Arc<dyn Connector>, ConnectorError> {
        let mut active = self.active.lock().await;
        if let Some(conn) = active.get(&host.name) {
            return Ok(Arc::clone(conn));
        }

        debug!(host = %host.name, address = %host.address, "establishing connection");
        let conn = self.factory.connect(host).await?;
        active.insert(host.name.clone(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Number of established sessions.
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }
}

//! Connector registry
//!
//! Lists the connectors the harness knows about. The built-in registry holds
//! the local socket connector; tests build their own with scripted ones.

use std::sync::Arc;

use crate::common::{Error, Result};

use super::local::LocalSocketConnector;
use super::Connector;

/// Summary of a registered connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorInfo {
    pub name: String,
    pub description: String,
    pub transport: String,
}

/// Set of available connectors, looked up by name
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in connector
    pub fn builtin() -> Self {
        Self::new().with(Arc::new(LocalSocketConnector))
    }

    /// Add a connector; a later registration with the same name shadows earlier ones
    pub fn with(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.retain(|c| c.name() != connector.name());
        self.connectors.push(connector);
        self
    }

    /// Describe all registered connectors
    pub fn list(&self) -> Vec<ConnectorInfo> {
        self.connectors
            .iter()
            .map(|c| ConnectorInfo {
                name: c.name().to_string(),
                description: c.description().to_string(),
                transport: c.transport().to_string(),
            })
            .collect()
    }

    /// Find a connector by name
    pub fn find(&self, name: &str) -> Result<Arc<dyn Connector>> {
        let connector = self
            .connectors
            .iter()
            .find(|c| c.name() == name)
            .cloned()
            .ok_or_else(|| Error::ConnectorNotFound(name.to_string()))?;

        tracing::info!(
            name = connector.name(),
            description = connector.description(),
            transport = connector.transport(),
            "Found connector"
        );

        Ok(connector)
    }
}

//! The catalog client.
//!
//! [`CatalogClient`] composes the two injected collaborators (a
//! [`RestExecutor`] for reads, a [`ProposalSink`] for writes) and exposes
//! the typed operation surface: aspect access, filtered search scrolling,
//! relationship traversal, and entity lifecycle. All I/O is synchronous and
//! blocking; the client holds no mutable state beyond the cached server id.

pub mod aspects;
pub mod lifecycle;
pub mod relationships;
pub mod search;

use crate::config::ClientConfig;
use crate::emitter::{ProposalSink, RestProposalSink};
use crate::error::{CatalogError, Result};
use crate::rest::{HttpExecutor, RestExecutor};
use lode_types::{TelemetryClientId, Urn};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Optional telemetry collaborator.
///
/// When passed to [`CatalogClient::connect_with`] and enabled, the client
/// caches the server's telemetry id at construction. Its absence disables
/// the lookup entirely; there is no process-wide telemetry state.
#[derive(Debug, Clone, Copy)]
pub struct Telemetry {
    pub enabled: bool,
}

/// Placeholder server id used when telemetry is disabled or the lookup
/// fails.
const MISSING_SERVER_ID: &str = "missing";

/// Client for the Lodestone metadata catalog.
pub struct CatalogClient {
    config: ClientConfig,
    executor: Arc<dyn RestExecutor>,
    sink: Arc<dyn ProposalSink>,
    server_id: Option<String>,
}

impl CatalogClient {
    /// Connects to the catalog described by `config` and verifies the
    /// connection.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        Self::connect_with(config, None)
    }

    /// Connects, optionally resolving the server id for telemetry.
    pub fn connect_with(config: ClientConfig, telemetry: Option<&Telemetry>) -> Result<Self> {
        let executor: Arc<dyn RestExecutor> = Arc::new(HttpExecutor::new(&config)?);
        let sink = Arc::new(RestProposalSink::new(
            executor.clone(),
            config.server.clone(),
        ));
        let mut client = Self::with_collaborators(config, executor, sink);
        client.test_connection()?;
        if telemetry.map(|t| t.enabled).unwrap_or(false) {
            client.resolve_server_id();
        }
        Ok(client)
    }

    /// Builds a client from explicit collaborators. No connection check is
    /// performed; this is the constructor tests and embedders use.
    pub fn with_collaborators(
        config: ClientConfig,
        executor: Arc<dyn RestExecutor>,
        sink: Arc<dyn ProposalSink>,
    ) -> Self {
        Self {
            config,
            executor,
            sink,
            server_id: None,
        }
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The cached server id, when telemetry resolved one.
    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    /// Fetches the server's configuration document.
    pub fn get_server_config(&self) -> Result<Value> {
        self.get(&format!("{}/config", self.server()), &[])
    }

    /// Verifies that the configured address answers like a catalog server.
    pub fn test_connection(&self) -> Result<()> {
        let config = self.get_server_config()?;
        if !config.is_object() {
            return Err(CatalogError::InvalidResponse(
                "config endpoint did not return an object; is this the catalog address?"
                    .to_string(),
            ));
        }
        debug!(server = %self.server(), "connected to catalog");
        Ok(())
    }

    /// Resolves and caches the server's telemetry id. Best-effort: any
    /// failure records the placeholder id instead of erroring.
    pub fn resolve_server_id(&mut self) {
        let resolved = match self.get_aspect::<TelemetryClientId>(&Urn::telemetry_client()) {
            Ok(Some(aspect)) => aspect.client_id,
            Ok(None) => MISSING_SERVER_ID.to_string(),
            Err(e) => {
                debug!(error = %e, "failed to resolve server id");
                MISSING_SERVER_ID.to_string()
            }
        };
        self.server_id = Some(resolved);
    }

    pub(crate) fn server(&self) -> &str {
        &self.config.server
    }

    pub(crate) fn sink(&self) -> &dyn ProposalSink {
        self.sink.as_ref()
    }

    pub(crate) fn executor(&self) -> &dyn RestExecutor {
        self.executor.as_ref()
    }

    pub(crate) fn get(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        self.executor.get(url, params).map_err(Into::into)
    }

    pub(crate) fn post(&self, url: &str, body: &Value) -> Result<Value> {
        self.executor.post(url, body).map_err(Into::into)
    }
}

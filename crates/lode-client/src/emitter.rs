//! Change proposal emission.
//!
//! The write path is a sink the client composes with: lifecycle operations
//! build a [`ChangeProposal`] and emit it here, without knowing how it is
//! delivered. [`RestProposalSink`] delivers proposals to the catalog's
//! ingest endpoint.

use crate::error::{CatalogError, Result};
use crate::rest::RestExecutor;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use lode_types::ChangeProposal;

/// Accepts change proposals for processing.
pub trait ProposalSink: Send + Sync {
    /// Emits one proposal. Returns once the sink has accepted it.
    fn emit(&self, proposal: &ChangeProposal) -> Result<()>;
}

/// Sink that posts proposals to the catalog's ingest action.
pub struct RestProposalSink {
    executor: Arc<dyn RestExecutor>,
    server: String,
}

impl RestProposalSink {
    pub fn new(executor: Arc<dyn RestExecutor>, server: impl Into<String>) -> Self {
        Self {
            executor,
            server: server.into(),
        }
    }
}

impl ProposalSink for RestProposalSink {
    fn emit(&self, proposal: &ChangeProposal) -> Result<()> {
        // The ingest action expects the aspect as a JSON string alongside
        // its content type, not as an inline object.
        let serialized = serde_json::to_string(&proposal.aspect)
            .map_err(|e| CatalogError::InvalidRequest(format!("unserializable aspect: {e}")))?;
        let mut wire = json!({
            "entityType": proposal.entity_type,
            "entityUrn": proposal.entity_urn,
            "changeType": proposal.change_type,
            "aspectName": proposal.aspect_name,
            "aspect": {
                "contentType": "application/json",
                "value": serialized,
            },
        });
        if let Some(metadata) = &proposal.system_metadata {
            wire["systemMetadata"] = serde_json::to_value(metadata)
                .map_err(|e| CatalogError::InvalidRequest(format!("unserializable metadata: {e}")))?;
        }

        debug!(
            urn = %proposal.entity_urn,
            aspect = %proposal.aspect_name,
            "emitting change proposal"
        );
        let url = format!("{}/aspects?action=ingestProposal", self.server);
        self.executor.post(&url, &json!({ "proposal": wire }))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExecutor;
    use lode_types::{EntityStatus, SystemMetadata, Urn};
    use serde_json::json;

    #[test]
    fn posts_ingest_envelope_with_stringified_aspect() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(json!({}));
        let sink = RestProposalSink::new(executor.clone(), "http://localhost:8080");

        let urn = Urn::new("urn:lode:tag:pii").unwrap();
        let proposal = ChangeProposal::upsert(
            &urn,
            &EntityStatus { removed: true },
            Some(SystemMetadata {
                run_id: "run-1".to_string(),
                last_observed: 1_700_000_000_000,
            }),
        )
        .unwrap();
        sink.emit(&proposal).unwrap();

        let requests = executor.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url,
            "http://localhost:8080/aspects?action=ingestProposal"
        );
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["proposal"]["entityUrn"], "urn:lode:tag:pii");
        assert_eq!(body["proposal"]["changeType"], "UPSERT");
        assert_eq!(
            body["proposal"]["aspect"]["value"],
            "{\"removed\":true}"
        );
        assert_eq!(body["proposal"]["systemMetadata"]["runId"], "run-1");
    }
}

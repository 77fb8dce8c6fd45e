//! Change proposals: the write path of the catalog.
//!
//! Mutations are never issued directly; a caller describes the desired
//! aspect state in a [`ChangeProposal`] and hands it to a proposal sink for
//! processing. Soft deletion, for example, is a proposal writing a
//! tombstone status aspect.

use crate::aspect::Aspect;
use crate::urn::Urn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of mutation a proposal requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Upsert,
    Create,
    Patch,
}

/// Provenance metadata attached to a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetadata {
    /// Identifier of the run that produced the change.
    pub run_id: String,
    /// Observation timestamp in epoch milliseconds.
    pub last_observed: i64,
}

/// A proposed mutation to one aspect of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeProposal {
    pub entity_urn: Urn,
    pub entity_type: String,
    pub change_type: ChangeType,
    pub aspect_name: String,
    /// Wire JSON form of the aspect payload.
    pub aspect: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_metadata: Option<SystemMetadata>,
}

impl ChangeProposal {
    /// Builds an upsert proposal from a typed aspect value.
    pub fn upsert<A: Aspect>(
        entity_urn: &Urn,
        aspect: &A,
        system_metadata: Option<SystemMetadata>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            entity_type: entity_urn.entity_type().to_string(),
            entity_urn: entity_urn.clone(),
            change_type: ChangeType::Upsert,
            aspect_name: A::NAME.to_string(),
            aspect: serde_json::to_value(aspect)?,
            system_metadata,
        })
    }
}

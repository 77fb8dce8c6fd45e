//! Entity lifecycle operations.
//!
//! Existence checks probe for an entity's key aspect. Deletion comes in two
//! shapes: soft deletion writes a tombstone status aspect through the
//! proposal sink and is reversible; hard deletion removes rows server-side
//! and is not. Reference cleanup removes (or, in dry-run mode, reports)
//! aspects elsewhere that point at a urn.

use crate::error::{CatalogError, Result};
use crate::graph::CatalogClient;
use chrono::{DateTime, Utc};
use lode_types::{
    is_timeseries_aspect, ChangeProposal, EntityStatus, SystemMetadata, Urn, KEY_ASPECTS,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Run id recorded on soft deletions when the caller does not supply one.
pub const DEFAULT_RUN_ID: &str = "__lodestone-client";

/// One aspect elsewhere in the catalog that references a deleted urn.
///
/// Returned by [`CatalogClient::delete_references`] as a partial sample;
/// callers must not assume the list is exhaustive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedAspect {
    pub urn: Urn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<String>,
}

impl CatalogClient {
    /// Returns whether the entity exists in the catalog.
    ///
    /// Existence is decided by the presence of the entity's key aspect. An
    /// entity type with no registered key aspect is a misconfiguration and
    /// fails hard; it never reads as "does not exist".
    pub fn exists(&self, urn: &Urn) -> Result<bool> {
        let entity_type = urn.entity_type();
        let descriptor = KEY_ASPECTS.get(entity_type).ok_or_else(|| {
            CatalogError::InvalidRequest(format!(
                "no key aspect registered for entity type {entity_type} (urn {urn})"
            ))
        })?;
        let key_aspect = self.get_aspect_dyn(urn, descriptor, 0).map_err(|e| {
            debug!(urn = %urn, error = %e, "existence check failed");
            e
        })?;
        Ok(key_aspect.is_some())
    }

    /// Soft-deletes an entity by writing a tombstone status aspect.
    ///
    /// The change is emitted through the proposal sink with provenance
    /// metadata; `deletion_timestamp` defaults to now.
    pub fn soft_delete(
        &self,
        urn: &Urn,
        run_id: Option<&str>,
        deletion_timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let last_observed = deletion_timestamp
            .unwrap_or_else(Utc::now)
            .timestamp_millis();
        let proposal = ChangeProposal::upsert(
            urn,
            &EntityStatus { removed: true },
            Some(SystemMetadata {
                run_id: run_id.unwrap_or(DEFAULT_RUN_ID).to_string(),
                last_observed,
            }),
        )
        .map_err(|e| CatalogError::InvalidRequest(format!("unserializable status aspect: {e}")))?;
        self.sink().emit(&proposal)
    }

    /// Hard-deletes an entity and returns the affected row counts as
    /// `(rows, timeseries_rows)`. Irreversible.
    pub fn hard_delete(&self, urn: &Urn) -> Result<(u64, u64)> {
        let response = self.post(&self.delete_endpoint(), &json!({ "urn": urn }))?;
        let summary = response.get("value").cloned().unwrap_or(Value::Null);
        let rows = summary.get("rows").and_then(Value::as_u64).unwrap_or(0);
        let timeseries_rows = summary
            .get("timeseriesRows")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok((rows, timeseries_rows))
    }

    /// Deletes an entity, choosing between the soft and hard strategy.
    pub fn delete(&self, urn: &Urn, hard: bool) -> Result<()> {
        if hard {
            let (rows, timeseries_rows) = self.hard_delete(urn)?;
            debug!(urn = %urn, rows, timeseries_rows, "hard deleted entity");
        } else {
            self.soft_delete(urn, None, None)?;
            debug!(urn = %urn, "soft deleted entity");
        }
        Ok(())
    }

    /// Hard-deletes timeseries rows of one aspect within an optional time
    /// range. An omitted bound leaves that side unbounded. Returns the
    /// number of timeseries rows affected.
    pub fn hard_delete_timeseries(
        &self,
        urn: &Urn,
        aspect_name: &str,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        if !is_timeseries_aspect(aspect_name) {
            return Err(CatalogError::InvalidRequest(format!(
                "{aspect_name} is not a registered timeseries aspect"
            )));
        }
        let mut body = json!({ "urn": urn, "aspectName": aspect_name });
        if let Some(start_time) = start_time {
            body["startTimeMillis"] = json!(start_time.timestamp_millis());
        }
        if let Some(end_time) = end_time {
            body["endTimeMillis"] = json!(end_time.timestamp_millis());
        }
        let response = self.post(&self.delete_endpoint(), &body)?;
        Ok(response
            .get("value")
            .and_then(|v| v.get("timeseriesRows"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    /// Removes all aspects elsewhere that reference `urn`, returning the
    /// total reference count and a partial sample of the affected aspects.
    ///
    /// With `dry_run` the catalog only reports what would be affected; the
    /// request is otherwise identical.
    pub fn delete_references(&self, urn: &Urn, dry_run: bool) -> Result<(u64, Vec<ReferencedAspect>)> {
        let body = json!({ "urn": urn, "dryRun": dry_run });
        let url = format!("{}/entities?action=deleteReferences", self.server());
        let response = self.post(&url, &body)?;
        let value = response.get("value").cloned().unwrap_or(Value::Null);
        let total = value.get("total").and_then(Value::as_u64).unwrap_or(0);
        let related = match value.get("relatedAspects") {
            Some(related) => serde_json::from_value(related.clone()).map_err(|e| {
                CatalogError::InvalidResponse(format!("malformed relatedAspects: {e}"))
            })?,
            None => Vec::new(),
        };
        Ok((total, related))
    }

    fn delete_endpoint(&self) -> String {
        format!("{}/entities?action=delete", self.server())
    }
}

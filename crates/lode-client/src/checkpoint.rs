//! Ingestion checkpoint retrieval.
//!
//! Checkpoints are progress markers owned by the ingestion subsystem; this
//! client only retrieves them. A checkpoint is scoped to a (pipeline, job)
//! pair and carries an opaque state payload, deserialized here through a
//! caller-chosen state type.

use crate::error::{CatalogError, Result};
use crate::graph::CatalogClient;
use chrono::{DateTime, Utc};
use lode_types::{CheckpointStateBlob, IngestionCheckpointAspect, Urn};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// State encoding this client knows how to decode.
const UTF8_JSON: &str = "utf8-json";

/// The latest recorded progress of one ingestion job.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint<S> {
    pub pipeline_name: String,
    pub job_name: String,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    /// Decoded state payload.
    pub state: S,
}

impl CatalogClient {
    /// Retrieves the latest checkpoint for a (pipeline, job) pair,
    /// decoding its state into `S`. Returns `Ok(None)` when the job has
    /// never checkpointed.
    pub fn get_latest_pipeline_checkpoint<S: DeserializeOwned>(
        &self,
        pipeline_name: &str,
        job_name: &str,
    ) -> Result<Option<Checkpoint<S>>> {
        let urn = Urn::ingestion_job(pipeline_name, job_name);
        let mut criteria = BTreeMap::new();
        criteria.insert("pipelineName".to_string(), pipeline_name.to_string());
        criteria.insert("jobName".to_string(), job_name.to_string());

        let Some(aspect) =
            self.get_latest_timeseries_value::<IngestionCheckpointAspect>(&urn, &criteria)?
        else {
            return Ok(None);
        };

        let state = decode_state(&aspect.state)?;
        let timestamp = DateTime::from_timestamp_millis(aspect.timestamp_millis)
            .ok_or_else(|| {
                CatalogError::InvalidResponse(format!(
                    "checkpoint timestamp out of range: {}",
                    aspect.timestamp_millis
                ))
            })?;
        Ok(Some(Checkpoint {
            pipeline_name: aspect.pipeline_name,
            job_name: aspect.job_name,
            run_id: aspect.run_id,
            timestamp,
            state,
        }))
    }
}

fn decode_state<S: DeserializeOwned>(blob: &CheckpointStateBlob) -> Result<S> {
    if blob.serde_format != UTF8_JSON {
        return Err(CatalogError::InvalidResponse(format!(
            "unsupported checkpoint state encoding: {}",
            blob.serde_format
        )));
    }
    serde_json::from_str(&blob.payload).map_err(|e| {
        CatalogError::InvalidResponse(format!("failed to decode checkpoint state: {e}"))
    })
}

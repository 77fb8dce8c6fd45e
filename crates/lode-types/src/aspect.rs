//! Typed aspect records.
//!
//! An aspect is a named, versioned record attached to exactly one entity.
//! Snapshot aspects hold the current state and are overwritten on write;
//! timeseries aspects are append-only and ordered by timestamp. The set of
//! aspect kinds is closed: each record type below implements [`Aspect`] and
//! is registered in [`crate::registry`].

use crate::urn::Urn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed aspect record.
///
/// `NAME` is the aspect name used on the wire (`?aspect=...`),
/// `RECORD_FULLNAME` is the fully-qualified wire schema name. The two differ
/// by serialization convention: single-aspect responses nest the payload
/// under the schema name with the `.avro` namespace segment stripped, not
/// under the aspect name. [`Aspect::wire_key`] computes that derived key.
pub trait Aspect: Serialize + DeserializeOwned {
    /// Aspect name as used in request parameters and entity envelopes.
    const NAME: &'static str;
    /// Fully-qualified name of the wire record schema.
    const RECORD_FULLNAME: &'static str;
    /// Whether this aspect is append-only timeseries data.
    const TIMESERIES: bool = false;

    /// The field name the single-aspect response envelope nests the payload
    /// under.
    fn wire_key() -> String {
        Self::RECORD_FULLNAME.replace(".avro", "")
    }
}

macro_rules! impl_aspect {
    ($ty:ty, $name:literal, $fullname:literal) => {
        impl Aspect for $ty {
            const NAME: &'static str = $name;
            const RECORD_FULLNAME: &'static str = $fullname;
        }
    };
    ($ty:ty, $name:literal, $fullname:literal, timeseries) => {
        impl Aspect for $ty {
            const NAME: &'static str = $name;
            const RECORD_FULLNAME: &'static str = $fullname;
            const TIMESERIES: bool = true;
        }
    };
}

// ---------------------------------------------------------------------------
// Snapshot aspects
// ---------------------------------------------------------------------------

/// Soft-deletion status of an entity.
///
/// Removal is modeled as a tombstone: a soft-deleted entity carries
/// `removed: true` and is filtered out of search by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStatus {
    pub removed: bool,
}

impl_aspect!(EntityStatus, "status", "io.lodestone.avro.common.Status");

/// The role an owner plays for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnershipType {
    TechnicalOwner,
    BusinessOwner,
    DataSteward,
    Stakeholder,
}

/// A single ownership association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    /// Urn of the owning user or group.
    pub owner: Urn,
    /// Role the owner plays.
    #[serde(rename = "type")]
    pub owner_type: OwnershipType,
}

/// Ownership information for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub owners: Vec<Owner>,
}

impl_aspect!(Ownership, "ownership", "io.lodestone.avro.common.Ownership");

/// Editable properties of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form key/value properties. Some legacy producers encode the
    /// environment here as `env=...` or `instance=...`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_properties: BTreeMap<String, String>,
}

impl_aspect!(
    DatasetProperties,
    "datasetProperties",
    "io.lodestone.avro.dataset.DatasetProperties"
);

/// A single field within a dataset schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub field_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nullable: bool,
}

/// Schema of a dataset as reported by its platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    pub schema_name: String,
    pub platform: Urn,
    pub version: i64,
    pub fields: Vec<SchemaField>,
}

impl_aspect!(
    SchemaMetadata,
    "schemaMetadata",
    "io.lodestone.avro.schema.SchemaMetadata"
);

/// A tag applied to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAssociation {
    pub tag: Urn,
}

/// Tags applied to an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTags {
    #[serde(default)]
    pub tags: Vec<TagAssociation>,
}

impl_aspect!(GlobalTags, "globalTags", "io.lodestone.avro.common.GlobalTags");

/// A glossary term applied to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermAssociation {
    pub urn: Urn,
}

/// Glossary terms applied to an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerms {
    #[serde(default)]
    pub terms: Vec<TermAssociation>,
}

impl_aspect!(
    GlossaryTerms,
    "glossaryTerms",
    "io.lodestone.avro.common.GlossaryTerms"
);

/// Domains an entity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domains {
    #[serde(default)]
    pub domains: Vec<Urn>,
}

impl_aspect!(Domains, "domains", "io.lodestone.avro.domain.Domains");

/// Browse paths under which an entity is filed in the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsePaths {
    #[serde(default)]
    pub paths: Vec<String>,
}

impl_aspect!(
    BrowsePaths,
    "browsePaths",
    "io.lodestone.avro.common.BrowsePaths"
);

/// Subtype names refining an entity's type (e.g. a container that is a
/// `Schema` or a `Database`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTypes {
    #[serde(default)]
    pub type_names: Vec<String>,
}

impl_aspect!(SubTypes, "subTypes", "io.lodestone.avro.common.SubTypes");

/// Telemetry client id exposed by the server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryClientId {
    pub client_id: String,
}

impl_aspect!(
    TelemetryClientId,
    "telemetryClientId",
    "io.lodestone.avro.telemetry.TelemetryClientId"
);

// ---------------------------------------------------------------------------
// Key aspects
//
// The key aspect of an entity type defines its identity; its presence is what
// existence checks probe for.
// ---------------------------------------------------------------------------

/// Key aspect of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetKey {
    pub platform: Urn,
    pub name: String,
    pub origin: String,
}

impl_aspect!(DatasetKey, "datasetKey", "io.lodestone.avro.key.DatasetKey");

/// Key aspect of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerKey {
    pub guid: String,
}

impl_aspect!(ContainerKey, "containerKey", "io.lodestone.avro.key.ContainerKey");

/// Key aspect of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpUserKey {
    pub username: String,
}

impl_aspect!(CorpUserKey, "corpUserKey", "io.lodestone.avro.key.CorpUserKey");

/// Key aspect of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpGroupKey {
    pub name: String,
}

impl_aspect!(CorpGroupKey, "corpGroupKey", "io.lodestone.avro.key.CorpGroupKey");

/// Key aspect of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagKey {
    pub name: String,
}

impl_aspect!(TagKey, "tagKey", "io.lodestone.avro.key.TagKey");

/// Key aspect of a glossary term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTermKey {
    pub name: String,
}

impl_aspect!(
    GlossaryTermKey,
    "glossaryTermKey",
    "io.lodestone.avro.key.GlossaryTermKey"
);

/// Key aspect of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainKey {
    pub id: String,
}

impl_aspect!(DomainKey, "domainKey", "io.lodestone.avro.key.DomainKey");

/// Key aspect of a data platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPlatformKey {
    pub platform_name: String,
}

impl_aspect!(
    DataPlatformKey,
    "dataPlatformKey",
    "io.lodestone.avro.key.DataPlatformKey"
);

/// Key aspect of a data flow (pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFlowKey {
    pub orchestrator: String,
    pub flow_id: String,
    pub cluster: String,
}

impl_aspect!(DataFlowKey, "dataFlowKey", "io.lodestone.avro.key.DataFlowKey");

/// Key aspect of a data job (task within a pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataJobKey {
    pub flow: Urn,
    pub job_id: String,
}

impl_aspect!(DataJobKey, "dataJobKey", "io.lodestone.avro.key.DataJobKey");

// ---------------------------------------------------------------------------
// Timeseries aspects
// ---------------------------------------------------------------------------

/// Usage statistics for a dataset over one reporting bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetUsageStatistics {
    pub timestamp_millis: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_user_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_sql_queries: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_sql_queries: Vec<String>,
}

impl_aspect!(
    DatasetUsageStatistics,
    "datasetUsageStatistics",
    "io.lodestone.avro.timeseries.DatasetUsageStatistics",
    timeseries
);

/// Profiling results for a dataset at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetProfile {
    pub timestamp_millis: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_count: Option<u64>,
}

impl_aspect!(
    DatasetProfile,
    "datasetProfile",
    "io.lodestone.avro.timeseries.DatasetProfile",
    timeseries
);

/// Opaque serialized checkpoint state.
///
/// The payload is deserialized by the caller through a pluggable state type;
/// this layer only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointStateBlob {
    pub format_version: String,
    /// Payload encoding; currently only `utf8-json` is produced.
    #[serde(rename = "serde")]
    pub serde_format: String,
    pub payload: String,
}

/// Ingestion progress marker scoped to a (pipeline, job) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionCheckpointAspect {
    pub timestamp_millis: i64,
    pub pipeline_name: String,
    pub job_name: String,
    pub run_id: String,
    pub state: CheckpointStateBlob,
}

impl_aspect!(
    IngestionCheckpointAspect,
    "ingestionCheckpoint",
    "io.lodestone.avro.timeseries.IngestionCheckpoint",
    timeseries
);

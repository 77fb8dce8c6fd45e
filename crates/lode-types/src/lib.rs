//! # lode-types
//!
//! Core data model for the Lodestone metadata catalog.
//!
//! This crate defines the value types shared by every Lodestone client
//! component: entity urns, the closed set of typed aspect records, the
//! static aspect registry, the search filter expression tree, and the
//! change proposal used on the write path. It performs no I/O.

pub mod aspect;
pub mod filter;
pub mod proposal;
pub mod registry;
pub mod urn;

pub use aspect::{
    Aspect,
    BrowsePaths,
    CheckpointStateBlob,
    ContainerKey,
    CorpGroupKey,
    CorpUserKey,
    DataFlowKey,
    DataJobKey,
    DataPlatformKey,
    DatasetKey,
    DatasetProfile,
    DatasetProperties,
    DatasetUsageStatistics,
    Domains,
    DomainKey,
    EntityStatus,
    GlobalTags,
    GlossaryTermKey,
    GlossaryTerms,
    IngestionCheckpointAspect,
    Owner,
    Ownership,
    OwnershipType,
    SchemaField,
    SchemaMetadata,
    SubTypes,
    TagAssociation,
    TagKey,
    TelemetryClientId,
    TermAssociation,
};
pub use filter::{
    build_or_filters, search_entity_type, AndClause, Filter, FilterCondition, FilterRule,
    RemovedStatusFilter,
};
pub use proposal::{ChangeProposal, ChangeType, SystemMetadata};
pub use registry::{is_timeseries_aspect, AspectDescriptor, AspectValue, ASPECTS, KEY_ASPECTS};
pub use urn::{Urn, UrnError};

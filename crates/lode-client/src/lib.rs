//! # lode-client
//!
//! Client library for the Lodestone metadata catalog.
//!
//! The central type is [`CatalogClient`]: typed aspect access, filtered
//! entity search with cursor scrolling, relationship traversal, and entity
//! lifecycle operations, all over synchronous blocking I/O. The HTTP
//! transport and the write-path sink are injected collaborators behind the
//! [`RestExecutor`] and [`ProposalSink`] traits, so the client can be
//! exercised without a server.

pub mod checkpoint;
pub mod config;
pub mod emitter;
pub mod error;
pub mod graph;
pub mod mock;
pub mod rest;

pub use checkpoint::Checkpoint;
pub use config::ClientConfig;
pub use emitter::{ProposalSink, RestProposalSink};
pub use error::{CatalogError, Result};
pub use graph::lifecycle::{ReferencedAspect, DEFAULT_RUN_ID};
pub use graph::relationships::{RelatedEntity, RelatedEntityIter, RelationshipDirection};
pub use graph::search::{UrnScroll, UrnSearchParams, DEFAULT_SEARCH_BATCH_SIZE};
pub use graph::{CatalogClient, Telemetry};
pub use rest::{HttpExecutor, RestError, RestExecutor};

// Re-export the data model for convenience.
pub use lode_types as types;

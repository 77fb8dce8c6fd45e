//! Entity urns for the Lodestone catalog.
//!
//! Every entity in the catalog is identified by a globally unique urn of the
//! form `urn:lode:<entityType>:<id...>`. Urns are opaque beyond the entity
//! type prefix: callers create them or receive them from the catalog, and
//! never mutate them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The scheme prefix every catalog urn carries.
const URN_PREFIX: &str = "urn:lode:";

/// Error raised when a string is not a well-formed catalog urn.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrnError {
    #[error("urn must start with '{URN_PREFIX}': {0}")]
    MissingPrefix(String),

    #[error("urn has no entity type segment: {0}")]
    MissingEntityType(String),

    #[error("urn has no id segment: {0}")]
    MissingId(String),
}

/// A unique identifier for a catalog entity.
///
/// Wraps the canonical string form and exposes the parsed entity type. The
/// inner string is immutable for the lifetime of the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Urn(String);

impl Urn {
    /// Parses and validates a urn from its canonical string form.
    pub fn new(urn: impl Into<String>) -> Result<Self, UrnError> {
        let urn = urn.into();
        let rest = urn
            .strip_prefix(URN_PREFIX)
            .ok_or_else(|| UrnError::MissingPrefix(urn.clone()))?;
        let (entity_type, id) = rest
            .split_once(':')
            .ok_or_else(|| UrnError::MissingEntityType(urn.clone()))?;
        if entity_type.is_empty() {
            return Err(UrnError::MissingEntityType(urn));
        }
        if id.is_empty() {
            return Err(UrnError::MissingId(urn));
        }
        Ok(Self(urn))
    }

    /// Returns the entity type encoded in the urn (e.g. `dataset`).
    pub fn entity_type(&self) -> &str {
        // Validated at construction, so both separators are present.
        let rest = &self.0[URN_PREFIX.len()..];
        rest.split(':').next().unwrap_or(rest)
    }

    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the urn percent-encoded for use as a URL path segment.
    pub fn url_encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }

    /// Builds a data platform urn from a platform name.
    ///
    /// Idempotent: a value that is already a platform urn passes through
    /// unchanged, so callers may supply either `snowflake` or
    /// `urn:lode:dataPlatform:snowflake`.
    pub fn data_platform(platform: &str) -> Self {
        if platform.starts_with(URN_PREFIX) {
            Self(platform.to_string())
        } else {
            Self(format!("{URN_PREFIX}dataPlatform:{platform}"))
        }
    }

    /// The well-known urn holding the server's telemetry client id aspect.
    pub fn telemetry_client() -> Self {
        Self(format!("{URN_PREFIX}telemetry:clientId"))
    }

    /// Builds the ingestion job urn that scopes checkpoints for a
    /// (pipeline, job) pair.
    pub fn ingestion_job(pipeline_name: &str, job_name: &str) -> Self {
        Self(format!(
            "{URN_PREFIX}dataJob:({URN_PREFIX}dataFlow:(lodestone,{pipeline_name},prod),{job_name})"
        ))
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Urn {
    type Err = UrnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Urn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Urn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Urn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

//! Relationship graph traversal.
//!
//! The relationships endpoint pages by offset rather than by cursor: each
//! page reports how many entities it holds, and the offset advances by that
//! count. A page reporting zero ends the traversal; so does a page whose
//! reported count is smaller than what it actually contains, which guards
//! against a malformed server response looping forever.

use crate::error::{CatalogError, Result};
use crate::graph::CatalogClient;
use lode_types::Urn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Direction of a relationship edge relative to the queried entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipDirection {
    Incoming,
    Outgoing,
}

impl RelationshipDirection {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "INCOMING",
            Self::Outgoing => "OUTGOING",
        }
    }
}

/// One related entity produced by a traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedEntity {
    pub urn: Urn,
    pub relationship_type: String,
}

impl CatalogClient {
    /// Returns a lazy traversal of entities related to `urn` through any of
    /// `relationship_types`, in the given direction.
    pub fn get_related_entities<'a>(
        &'a self,
        urn: &Urn,
        relationship_types: &[&str],
        direction: RelationshipDirection,
    ) -> RelatedEntityIter<'a> {
        RelatedEntityIter {
            client: self,
            urn: urn.clone(),
            relationship_types: relationship_types.iter().map(|t| t.to_string()).collect(),
            direction,
            start: 0,
            done: false,
            buffer: VecDeque::new(),
        }
    }

    fn relationships_endpoint(&self) -> String {
        format!("{}/openapi/relationships/v1/", self.server())
    }
}

/// Lazy offset-paged traversal over related entities.
pub struct RelatedEntityIter<'a> {
    client: &'a CatalogClient,
    urn: Urn,
    relationship_types: Vec<String>,
    direction: RelationshipDirection,
    start: u64,
    done: bool,
    buffer: VecDeque<RelatedEntity>,
}

impl RelatedEntityIter<'_> {
    fn fetch_page(&mut self) -> Result<()> {
        let mut params: Vec<(&str, String)> = vec![
            ("urn", self.urn.to_string()),
            ("direction", self.direction.as_str().to_string()),
        ];
        for relationship_type in &self.relationship_types {
            params.push(("relationshipTypes", relationship_type.clone()));
        }
        params.push(("start", self.start.to_string()));

        let response = self
            .client
            .get(&self.client.relationships_endpoint(), &params)?;

        let entities = response
            .get("entities")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for entry in &entities {
            let urn = entry
                .get("urn")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CatalogError::InvalidResponse(
                        "related entity carries no urn".to_string(),
                    )
                })?;
            let relationship_type = entry
                .get("relationshipType")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CatalogError::InvalidResponse(
                        "related entity carries no relationship type".to_string(),
                    )
                })?;
            self.buffer.push_back(RelatedEntity {
                urn: Urn::new(urn)?,
                relationship_type: relationship_type.to_string(),
            });
        }

        let count = response.get("count").and_then(Value::as_u64).unwrap_or(0);
        // A count below the page's actual size means the server is
        // reporting inconsistently; stop rather than loop on bad offsets.
        self.done = count == 0 || (count as usize) < entities.len();
        self.start += count;
        Ok(())
    }
}

impl Iterator for RelatedEntityIter<'_> {
    type Item = Result<RelatedEntity>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entity) = self.buffer.pop_front() {
                return Some(Ok(entity));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

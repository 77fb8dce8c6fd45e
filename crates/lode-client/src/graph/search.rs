//! Filtered entity search with cursor scrolling.
//!
//! Search runs through the catalog's GraphQL endpoint. A page of results
//! carries an opaque scroll cursor; the absence of a cursor is the sole
//! termination signal. A page smaller than the requested batch does NOT
//! mean the scroll is done, so [`UrnScroll`] keeps pulling until the server
//! withholds the cursor.

use crate::error::{CatalogError, Result};
use crate::graph::CatalogClient;
use lode_types::{
    build_or_filters, search_entity_type, AndClause, RemovedStatusFilter, Urn,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Default page size for scrolled search.
pub const DEFAULT_SEARCH_BATCH_SIZE: u32 = 10_000;

const SCROLL_QUERY: &str = r#"
query scrollUrnsWithFilters(
    $types: [EntityType!],
    $query: String!,
    $orFilters: [AndFilterInput!],
    $batchSize: Int!,
    $scrollId: String) {

    scrollAcrossEntities(input: {
        query: $query,
        count: $batchSize,
        scrollId: $scrollId,
        types: $types,
        orFilters: $orFilters,
        searchFlags: {
            skipHighlighting: true
            skipAggregates: true
        }
    }) {
        nextScrollId
        searchResults {
            entity {
                urn
            }
        }
    }
}
"#;

/// Parameters for a filtered urn search.
///
/// Filters combine conjunctively. A platform or env filter implicitly
/// excludes entity types that have neither.
#[derive(Debug, Clone, Default)]
pub struct UrnSearchParams {
    /// Entity types to include; all types when absent. Must be non-empty
    /// when provided.
    pub entity_types: Option<Vec<String>>,
    /// Platform to filter on.
    pub platform: Option<String>,
    /// Environment (e.g. PROD) to filter on.
    pub env: Option<String>,
    /// Full-text query; defaults to `*`.
    pub query: Option<String>,
    /// Deletion status to search for.
    pub status: RemovedStatusFilter,
    /// Page size for each scroll request.
    pub batch_size: Option<u32>,
}

impl UrnSearchParams {
    pub fn with_entity_types(mut self, entity_types: Vec<String>) -> Self {
        self.entity_types = Some(entity_types);
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    pub fn with_status(mut self, status: RemovedStatusFilter) -> Self {
        self.status = status;
        self
    }
}

impl CatalogClient {
    /// Executes a GraphQL query and returns its `data` payload.
    ///
    /// A response-level `errors` field is a protocol failure even when the
    /// HTTP status was 2xx.
    pub fn execute_graphql(&self, query: &str, variables: Option<Value>) -> Result<Value> {
        let mut body = json!({ "query": query });
        if let Some(variables) = variables {
            body["variables"] = variables;
        }
        debug!(server = %self.server(), "executing graphql query");
        let response = self.post(&format!("{}/api/graphql", self.server()), &body)?;

        if let Some(errors) = response.get("errors") {
            let harmless = errors.is_null()
                || errors.as_array().map(|a| a.is_empty()).unwrap_or(false);
            if !harmless {
                return Err(CatalogError::InvalidResponse(format!(
                    "graphql query returned errors: {errors}"
                )));
            }
        }
        response
            .get("data")
            .cloned()
            .ok_or_else(|| {
                CatalogError::InvalidResponse("graphql response carries no data".to_string())
            })
    }

    /// Returns a lazy scroll over all urns matching the given filters.
    ///
    /// Each pull fetches at most one page; dropping the scroll early simply
    /// stops issuing requests. Every call starts a fresh cursor.
    pub fn get_urns_by_filter(&self, params: &UrnSearchParams) -> Result<UrnScroll<'_>> {
        let types = match &params.entity_types {
            Some(entity_types) if entity_types.is_empty() => {
                return Err(CatalogError::InvalidRequest(
                    "entity_types cannot be an empty list".to_string(),
                ));
            }
            Some(entity_types) => Some(
                entity_types
                    .iter()
                    .map(|t| search_entity_type(t))
                    .collect::<Vec<_>>(),
            ),
            None => None,
        };

        let or_filters = build_or_filters(
            params.platform.as_deref(),
            params.env.as_deref(),
            params.status,
        );

        Ok(UrnScroll {
            client: self,
            types,
            query: params.query.clone().unwrap_or_else(|| "*".to_string()),
            or_filters,
            batch_size: params.batch_size.unwrap_or(DEFAULT_SEARCH_BATCH_SIZE),
            scroll_id: None,
            started: false,
            finished: false,
            buffer: VecDeque::new(),
        })
    }

    /// Runs one page of the legacy search action and returns the raw
    /// response.
    pub fn get_search_results(&self, entity: &str, start: u64, count: u64) -> Result<Value> {
        let body = json!({
            "input": "*",
            "entity": entity,
            "start": start,
            "count": count,
        });
        self.post(&self.search_endpoint(), &body)
    }

    /// Resolves a domain urn by display name. Returns the first match when
    /// several domains share the name.
    pub fn get_domain_urn_by_name(&self, domain_name: &str) -> Result<Option<Urn>> {
        let body = json!({
            "input": "*",
            "entity": "domain",
            "start": 0,
            "count": 10,
            "filter": {
                "or": [{
                    "and": [{
                        "field": "name",
                        "value": domain_name,
                        "condition": "EQUAL",
                    }]
                }]
            },
        });
        let response = self.post(&self.search_endpoint(), &body)?;

        let value = response.get("value").cloned().unwrap_or(Value::Null);
        let num_entities = value.get("numEntities").and_then(Value::as_u64).unwrap_or(0);
        if num_entities > 1 {
            warn!(
                domain = %domain_name,
                matches = num_entities,
                "several domains match; returning the first"
            );
        }
        let first = value
            .get("entities")
            .and_then(Value::as_array)
            .and_then(|entities| entities.first())
            .and_then(|entry| entry.get("entity"))
            .and_then(Value::as_str);
        match first {
            Some(urn) => Ok(Some(Urn::new(urn)?)),
            None => Ok(None),
        }
    }

    /// Lists urns of one entity type through the legacy listing action.
    ///
    /// Best-effort: failures are logged and collapse to `None`, so an empty
    /// result is ambiguous between "no entities" and "request failed".
    pub fn list_all_entity_urns(
        &self,
        entity_type: &str,
        start: u64,
        count: u64,
    ) -> Option<Vec<Urn>> {
        let body = json!({ "entity": entity_type, "start": start, "count": count });
        let url = format!("{}/entities?action=listUrns", self.server());
        let response = match self.post(&url, &body) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(entity_type, error = %e, "failed to list entity urns");
                return None;
            }
        };
        let entities = response
            .get("value")
            .and_then(|v| v.get("entities"))
            .and_then(Value::as_array)?;
        let mut urns = Vec::with_capacity(entities.len());
        for entry in entities {
            let raw = entry.as_str()?;
            match Urn::new(raw) {
                Ok(urn) => urns.push(urn),
                Err(e) => {
                    tracing::error!(urn = raw, error = %e, "skipping malformed urn in listing");
                    return None;
                }
            }
        }
        Some(urns)
    }

    fn search_endpoint(&self) -> String {
        format!("{}/entities?action=search", self.server())
    }
}

/// Lazy cursor scroll over search results.
///
/// Holds the last cursor explicitly; each page fetch is one blocking
/// network round trip, performed only when the buffered urns run out.
pub struct UrnScroll<'a> {
    client: &'a CatalogClient,
    types: Option<Vec<String>>,
    query: String,
    or_filters: Vec<AndClause>,
    batch_size: u32,
    scroll_id: Option<String>,
    started: bool,
    finished: bool,
    buffer: VecDeque<Urn>,
}

impl std::fmt::Debug for UrnScroll<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrnScroll")
            .field("types", &self.types)
            .field("query", &self.query)
            .field("or_filters", &self.or_filters)
            .field("batch_size", &self.batch_size)
            .field("scroll_id", &self.scroll_id)
            .field("started", &self.started)
            .field("finished", &self.finished)
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl UrnScroll<'_> {
    fn fetch_page(&mut self) -> Result<()> {
        self.started = true;
        let variables = json!({
            "types": self.types,
            "query": self.query,
            "orFilters": self.or_filters,
            "batchSize": self.batch_size,
            "scrollId": self.scroll_id,
        });
        let data = self
            .client
            .execute_graphql(SCROLL_QUERY, Some(variables))?;
        let scroll = data.get("scrollAcrossEntities").ok_or_else(|| {
            CatalogError::InvalidResponse(
                "graphql data carries no scrollAcrossEntities".to_string(),
            )
        })?;

        self.scroll_id = scroll
            .get("nextScrollId")
            .and_then(Value::as_str)
            .map(str::to_owned);

        if let Some(results) = scroll.get("searchResults").and_then(Value::as_array) {
            for entry in results {
                let urn = entry
                    .get("entity")
                    .and_then(|e| e.get("urn"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        CatalogError::InvalidResponse(
                            "search result carries no entity urn".to_string(),
                        )
                    })?;
                self.buffer.push_back(Urn::new(urn)?);
            }
        }

        if let Some(scroll_id) = &self.scroll_id {
            debug!(scroll_id = %scroll_id, "scrolling to next search page");
        }
        Ok(())
    }
}

impl Iterator for UrnScroll<'_> {
    type Item = Result<Urn>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(urn) = self.buffer.pop_front() {
                return Some(Ok(urn));
            }
            if self.finished || (self.started && self.scroll_id.is_none()) {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::mock::{MockExecutor, MockSink};
    use crate::rest::RestError;
    use std::sync::Arc;

    fn client(executor: &Arc<MockExecutor>) -> CatalogClient {
        CatalogClient::with_collaborators(
            ClientConfig::default(),
            executor.clone(),
            Arc::new(MockSink::new()),
        )
    }

    fn scroll_page(next_scroll_id: Option<&str>, urns: &[&str]) -> Value {
        json!({
            "data": {
                "scrollAcrossEntities": {
                    "nextScrollId": next_scroll_id,
                    "searchResults": urns
                        .iter()
                        .map(|urn| json!({ "entity": { "urn": urn } }))
                        .collect::<Vec<_>>(),
                }
            }
        })
    }

    #[test]
    fn scroll_yields_all_pages_in_server_order() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(scroll_page(
            Some("c1"),
            &["urn:lode:tag:a", "urn:lode:tag:b"],
        ));
        executor.push_ok(scroll_page(None, &["urn:lode:tag:c"]));
        let client = client(&executor);

        let urns: Vec<Urn> = client
            .get_urns_by_filter(&UrnSearchParams::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(
            urns.iter().map(Urn::as_str).collect::<Vec<_>>(),
            vec!["urn:lode:tag:a", "urn:lode:tag:b", "urn:lode:tag:c"]
        );
        // Exactly one round trip per page.
        let requests = executor.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.ends_with("/api/graphql"));
        assert_eq!(requests[0].body.as_ref().unwrap()["variables"]["scrollId"], Value::Null);
        assert_eq!(requests[1].body.as_ref().unwrap()["variables"]["scrollId"], "c1");
    }

    #[test]
    fn scroll_without_cursor_stops_after_one_call() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(scroll_page(None, &["urn:lode:tag:only"]));
        let client = client(&executor);

        let urns: Vec<Urn> = client
            .get_urns_by_filter(&UrnSearchParams::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(urns.len(), 1);
        assert_eq!(executor.requests().len(), 1);
    }

    #[test]
    fn scroll_is_lazy() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(scroll_page(Some("c1"), &["urn:lode:tag:a", "urn:lode:tag:b"]));
        let client = client(&executor);

        let mut scroll = client.get_urns_by_filter(&UrnSearchParams::default()).unwrap();
        // Nothing happens until the first pull.
        assert!(executor.requests().is_empty());

        scroll.next().unwrap().unwrap();
        scroll.next().unwrap().unwrap();
        // Both buffered urns came from a single page fetch; the next page
        // has not been requested yet.
        assert_eq!(executor.requests().len(), 1);
    }

    #[test]
    fn scroll_passes_types_filters_and_batch_size() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(scroll_page(None, &[]));
        let client = client(&executor);

        let params = UrnSearchParams::default()
            .with_entity_types(vec!["dataset".to_string(), "corpuser".to_string()])
            .with_platform("snowflake");
        let urns: Vec<_> = client.get_urns_by_filter(&params).unwrap().collect();
        assert!(urns.is_empty());

        let variables = executor.requests()[0].body.clone().unwrap()["variables"].clone();
        assert_eq!(variables["types"], json!(["DATASET", "CORP_USER"]));
        assert_eq!(variables["batchSize"], DEFAULT_SEARCH_BATCH_SIZE);
        assert_eq!(variables["query"], "*");
        let first_clause = &variables["orFilters"][0]["and"];
        assert_eq!(first_clause[0]["field"], "platform.keyword");
        assert_eq!(first_clause[1]["field"], "removed");
    }

    #[test]
    fn empty_entity_types_are_rejected() {
        let executor = Arc::new(MockExecutor::new());
        let client = client(&executor);
        let error = client
            .get_urns_by_filter(&UrnSearchParams::default().with_entity_types(vec![]))
            .unwrap_err();
        assert!(matches!(error, CatalogError::InvalidRequest(_)));
        assert!(executor.requests().is_empty());
    }

    #[test]
    fn graphql_errors_are_protocol_failures() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(json!({
            "errors": [{ "message": "unknown field" }],
            "data": null,
        }));
        let client = client(&executor);

        let mut scroll = client.get_urns_by_filter(&UrnSearchParams::default()).unwrap();
        let error = scroll.next().unwrap().unwrap_err();
        assert!(matches!(error, CatalogError::InvalidResponse(_)));
        // The scroll is dead after a failure.
        assert!(scroll.next().is_none());
    }

    #[test]
    fn domain_lookup_returns_first_match() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(json!({
            "value": {
                "numEntities": 2,
                "entities": [
                    { "entity": "urn:lode:domain:sales" },
                    { "entity": "urn:lode:domain:sales-emea" },
                ],
            }
        }));
        let client = client(&executor);
        let urn = client.get_domain_urn_by_name("Sales").unwrap().unwrap();
        assert_eq!(urn.as_str(), "urn:lode:domain:sales");
    }

    #[test]
    fn domain_lookup_without_match_is_none() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(json!({ "value": { "numEntities": 0, "entities": [] } }));
        let client = client(&executor);
        assert!(client.get_domain_urn_by_name("Nope").unwrap().is_none());
    }

    #[test]
    fn legacy_urn_listing_is_best_effort() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_err(RestError::Transport("connection refused".to_string()));
        let client = client(&executor);
        assert_eq!(client.list_all_entity_urns("dataset", 0, 100), None);

        executor.push_ok(json!({
            "value": { "entities": ["urn:lode:dataset:(urn:lode:dataPlatform:s3,logs,PROD)"] }
        }));
        let urns = client.list_all_entity_urns("dataset", 0, 100).unwrap();
        assert_eq!(urns.len(), 1);
    }
}

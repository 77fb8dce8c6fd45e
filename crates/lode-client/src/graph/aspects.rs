//! Typed aspect access.
//!
//! Maps between the catalog's generic JSON envelopes and the typed records
//! in `lode_types`. The single-aspect response nests its payload under a
//! schema-derived field name rather than the requested aspect name, 404 is
//! a success case meaning "no value", and timeseries records travel as JSON
//! strings inside the envelope; all of that is absorbed here.

use crate::error::{CatalogError, Result};
use crate::graph::CatalogClient;
use crate::rest::RestError;
use lode_types::{
    Aspect, AspectDescriptor, AspectValue, BrowsePaths, DatasetProperties,
    DatasetUsageStatistics, Domains, Filter, FilterRule, GlobalTags, GlossaryTerms, Ownership,
    SchemaMetadata, Urn, ASPECTS,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{error, warn};

impl CatalogClient {
    /// Retrieves the latest version of a snapshot aspect.
    ///
    /// Returns `Ok(None)` when the entity has no such aspect (HTTP 404);
    /// requesting a timeseries aspect through this path is caller misuse
    /// and fails without a network call.
    pub fn get_aspect<A: Aspect>(&self, urn: &Urn) -> Result<Option<A>> {
        self.get_aspect_version(urn, 0)
    }

    /// Retrieves a specific version of a snapshot aspect. Version 0 is the
    /// latest; versions above 0 count up from the oldest.
    pub fn get_aspect_version<A: Aspect>(&self, urn: &Urn, version: u64) -> Result<Option<A>> {
        if A::TIMESERIES {
            return Err(CatalogError::InvalidRequest(format!(
                "{} is a timeseries aspect; use get_latest_timeseries_value instead",
                A::NAME
            )));
        }
        let Some(response) = self.fetch_aspect_envelope(urn, A::NAME, version)? else {
            return Ok(None);
        };
        let key = A::wire_key();
        let payload = locate_payload(&response, &key, urn)?;
        serde_json::from_value(payload.clone()).map(Some).map_err(|e| {
            CatalogError::InvalidResponse(format!("failed to decode {}: {e}", A::NAME))
        })
    }

    /// Dynamic-dispatch twin of [`get_aspect_version`](Self::get_aspect_version),
    /// used where the aspect kind is chosen at runtime (existence checks,
    /// registry-driven callers).
    pub fn get_aspect_dyn(
        &self,
        urn: &Urn,
        descriptor: &AspectDescriptor,
        version: u64,
    ) -> Result<Option<AspectValue>> {
        if descriptor.timeseries {
            return Err(CatalogError::InvalidRequest(format!(
                "{} is a timeseries aspect; use get_latest_timeseries_value instead",
                descriptor.name
            )));
        }
        let Some(response) = self.fetch_aspect_envelope(urn, descriptor.name, version)? else {
            return Ok(None);
        };
        let key = descriptor.wire_key();
        let payload = locate_payload(&response, &key, urn)?;
        descriptor.decode(payload).map(Some).map_err(|e| {
            CatalogError::InvalidResponse(format!("failed to decode {}: {e}", descriptor.name))
        })
    }

    fn fetch_aspect_envelope(
        &self,
        urn: &Urn,
        aspect_name: &str,
        version: u64,
    ) -> Result<Option<Value>> {
        let url = format!("{}/aspects/{}", self.server(), urn.url_encoded());
        let params = [
            ("aspect", aspect_name.to_string()),
            ("version", version.to_string()),
        ];
        match self.executor().get(&url, &params) {
            Ok(response) => Ok(Some(response)),
            Err(RestError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetches the raw entity envelope, optionally restricted to the named
    /// aspects.
    pub fn get_entity_raw(&self, urn: &Urn, aspects: Option<&[&str]>) -> Result<Value> {
        let mut url = format!("{}/entitiesV2/{}", self.server(), urn.url_encoded());
        if let Some(aspects) = aspects {
            if aspects.is_empty() {
                return Err(CatalogError::InvalidRequest(
                    "aspects, if provided, must be a non-empty list".to_string(),
                ));
            }
            url.push_str(&format!("?aspects=List({})", aspects.join(",")));
        }
        self.get(&url, &[])
    }

    /// Retrieves all non-timeseries aspects of an entity as typed values.
    ///
    /// Aspect names the registry does not know are skipped with a warning:
    /// a newer server may attach kinds this client predates. Do not use
    /// this to decide whether an entity exists; the server answers for
    /// entities it has never seen.
    pub fn get_entity_semityped(&self, urn: &Urn) -> Result<BTreeMap<String, AspectValue>> {
        let response = self.get_entity_raw(urn, None)?;

        let mut result = BTreeMap::new();
        let Some(aspects) = response.get("aspects").and_then(Value::as_object) else {
            return Ok(result);
        };
        for (name, envelope) in aspects {
            let Some(descriptor) = ASPECTS.get(name.as_str()) else {
                warn!(aspect = %name, "ignoring unknown aspect type");
                continue;
            };
            let payload = envelope.get("value").ok_or_else(|| {
                CatalogError::InvalidResponse(format!(
                    "aspect {name} for {urn} has no value field"
                ))
            })?;
            let decoded = descriptor.decode(payload).map_err(|e| {
                CatalogError::InvalidResponse(format!("failed to decode {name}: {e}"))
            })?;
            result.insert(name.clone(), decoded);
        }
        Ok(result)
    }

    /// Retrieves the latest timeseries value matching an equality filter
    /// over aspect fields.
    ///
    /// The query is issued with `limit: 1`; a response carrying more than
    /// one value violates the protocol and is surfaced as such.
    pub fn get_latest_timeseries_value<A: Aspect>(
        &self,
        urn: &Urn,
        filter_criteria: &BTreeMap<String, String>,
    ) -> Result<Option<A>> {
        if !A::TIMESERIES {
            return Err(CatalogError::InvalidRequest(format!(
                "{} is not a timeseries aspect; use get_aspect instead",
                A::NAME
            )));
        }
        let rules: Vec<FilterRule> = filter_criteria
            .iter()
            .map(|(field, value)| FilterRule::equals(field.clone(), value.clone()))
            .collect();
        let body = json!({
            "urn": urn,
            "entity": urn.entity_type(),
            "aspect": A::NAME,
            "limit": 1,
            "filter": Filter::conjunction(rules),
        });
        let response = self.post(&self.timeseries_endpoint(), &body)?;

        let values = response
            .get("value")
            .and_then(|v| v.get("values"))
            .and_then(Value::as_array);
        let Some(values) = values else {
            return Ok(None);
        };
        match values.len() {
            0 => Ok(None),
            1 => decode_timeseries_record::<A>(&values[0]).map(Some),
            n => Err(CatalogError::InvalidResponse(format!(
                "requested at most one {} value, server returned {n}",
                A::NAME
            ))),
        }
    }

    /// Retrieves usage statistics for a dataset over a time range.
    ///
    /// Best-effort: failures are logged and collapse to `None`, so an empty
    /// result is ambiguous between "no data" and "request failed".
    pub fn get_usage_aspects(
        &self,
        urn: &Urn,
        start_time_millis: i64,
        end_time_millis: i64,
    ) -> Option<Vec<DatasetUsageStatistics>> {
        let body = json!({
            "urn": urn,
            "entity": "dataset",
            "aspect": DatasetUsageStatistics::NAME,
            "startTimeMillis": start_time_millis,
            "endTimeMillis": end_time_millis,
        });
        match self.fetch_usage_values(&body) {
            Ok(values) => Some(values),
            Err(e) => {
                error!(urn = %urn, error = %e, "failed to fetch usage aspects");
                None
            }
        }
    }

    fn fetch_usage_values(&self, body: &Value) -> Result<Vec<DatasetUsageStatistics>> {
        let response = self.post(&self.timeseries_endpoint(), body)?;
        let mut result = Vec::new();
        if let Some(values) = response
            .get("value")
            .and_then(|v| v.get("values"))
            .and_then(Value::as_array)
        {
            for record in values {
                // Records without a payload are skipped, matching the
                // server's behavior for partially ingested buckets.
                if record
                    .get("aspect")
                    .and_then(|a| a.get("value"))
                    .and_then(Value::as_str)
                    .is_none()
                {
                    continue;
                }
                result.push(decode_timeseries_record::<DatasetUsageStatistics>(record)?);
            }
        }
        Ok(result)
    }

    /// Counts rows of one aspect, optionally restricted by a urn pattern.
    pub fn get_aspect_counts(&self, aspect: &str, urn_like: Option<&str>) -> Result<u64> {
        let mut body = json!({ "aspect": aspect });
        if let Some(pattern) = urn_like {
            body["urnLike"] = json!(pattern);
        }
        let url = format!("{}/aspects?action=getCount", self.server());
        let response = self.post(&url, &body)?;
        response
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                CatalogError::InvalidResponse(
                    "getCount response carries no numeric value".to_string(),
                )
            })
    }

    fn timeseries_endpoint(&self) -> String {
        format!("{}/aspects?action=getTimeseriesAspectValues", self.server())
    }

    // Convenience getters for the common aspect kinds.

    pub fn get_ownership(&self, urn: &Urn) -> Result<Option<Ownership>> {
        self.get_aspect(urn)
    }

    pub fn get_dataset_properties(&self, urn: &Urn) -> Result<Option<DatasetProperties>> {
        self.get_aspect(urn)
    }

    pub fn get_schema_metadata(&self, urn: &Urn) -> Result<Option<SchemaMetadata>> {
        self.get_aspect(urn)
    }

    pub fn get_tags(&self, urn: &Urn) -> Result<Option<GlobalTags>> {
        self.get_aspect(urn)
    }

    pub fn get_glossary_terms(&self, urn: &Urn) -> Result<Option<GlossaryTerms>> {
        self.get_aspect(urn)
    }

    pub fn get_domains(&self, urn: &Urn) -> Result<Option<Domains>> {
        self.get_aspect(urn)
    }

    pub fn get_browse_paths(&self, urn: &Urn) -> Result<Option<BrowsePaths>> {
        self.get_aspect(urn)
    }
}

fn locate_payload<'a>(response: &'a Value, key: &str, urn: &Urn) -> Result<&'a Value> {
    response
        .get("aspect")
        .and_then(|aspect| aspect.get(key))
        .ok_or_else(|| {
            CatalogError::InvalidResponse(format!(
                "no {key} field in aspect response for {urn}"
            ))
        })
}

/// Decodes one timeseries record: the typed payload travels as a JSON
/// string under `aspect.value`.
fn decode_timeseries_record<A: Aspect>(record: &Value) -> Result<A> {
    let payload = record
        .get("aspect")
        .and_then(|a| a.get("value"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CatalogError::InvalidResponse(format!(
                "timeseries record for {} carries no payload",
                A::NAME
            ))
        })?;
    let parsed: Value = serde_json::from_str(payload).map_err(|e| {
        CatalogError::InvalidResponse(format!(
            "timeseries payload for {} is not valid JSON: {e}",
            A::NAME
        ))
    })?;
    serde_json::from_value(parsed)
        .map_err(|e| CatalogError::InvalidResponse(format!("failed to decode {}: {e}", A::NAME)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::mock::{MockExecutor, MockSink};
    use lode_types::EntityStatus;
    use serde_json::json;
    use std::sync::Arc;

    fn client(executor: &Arc<MockExecutor>) -> CatalogClient {
        CatalogClient::with_collaborators(
            ClientConfig::default(),
            executor.clone(),
            Arc::new(MockSink::new()),
        )
    }

    fn dataset_urn() -> Urn {
        Urn::new("urn:lode:dataset:(urn:lode:dataPlatform:kafka,events,PROD)").unwrap()
    }

    #[test]
    fn snapshot_aspect_is_located_under_derived_key() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(json!({
            "aspect": {
                "io.lodestone.common.Status": { "removed": true }
            }
        }));
        let client = client(&executor);

        let status: Option<EntityStatus> = client.get_aspect(&dataset_urn()).unwrap();
        assert_eq!(status, Some(EntityStatus { removed: true }));

        let requests = executor.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.contains("/aspects/urn%3Alode%3Adataset"));
        assert_eq!(
            requests[0].params,
            vec![
                ("aspect".to_string(), "status".to_string()),
                ("version".to_string(), "0".to_string()),
            ]
        );
    }

    #[test]
    fn missing_aspect_maps_404_to_none() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_err(RestError::Status {
            status: 404,
            info: json!({"message": "no such aspect"}),
        });
        let client = client(&executor);

        let status: Option<EntityStatus> = client.get_aspect(&dataset_urn()).unwrap();
        assert_eq!(status, None);
    }

    #[test]
    fn server_errors_propagate_with_payload() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_err(RestError::Status {
            status: 500,
            info: json!({"exceptionClass": "Boom"}),
        });
        let client = client(&executor);

        let error = client.get_aspect::<EntityStatus>(&dataset_urn()).unwrap_err();
        match error {
            CatalogError::RequestFailed { info, .. } => {
                assert_eq!(info["exceptionClass"], "Boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn successful_response_without_derived_key_is_a_protocol_error() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(json!({ "aspect": { "somethingElse": {} } }));
        let client = client(&executor);

        let error = client.get_aspect::<EntityStatus>(&dataset_urn()).unwrap_err();
        assert!(matches!(error, CatalogError::InvalidResponse(_)));
    }

    #[test]
    fn timeseries_kind_is_rejected_on_the_snapshot_path() {
        let executor = Arc::new(MockExecutor::new());
        let client = client(&executor);

        let error = client
            .get_aspect::<DatasetUsageStatistics>(&dataset_urn())
            .unwrap_err();
        assert!(matches!(error, CatalogError::InvalidRequest(_)));
        // Rejected before any network call.
        assert!(executor.requests().is_empty());
    }

    #[test]
    fn semityped_skips_unknown_aspects() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(json!({
            "aspects": {
                "status": { "value": { "removed": false } },
                "fromTheFuture": { "value": { "x": 1 } }
            }
        }));
        let client = client(&executor);

        let aspects = client.get_entity_semityped(&dataset_urn()).unwrap();
        assert_eq!(aspects.len(), 1);
        assert_eq!(
            aspects.get("status"),
            Some(&AspectValue::Status(EntityStatus { removed: false }))
        );
    }

    #[test]
    fn entity_raw_rejects_empty_aspect_list() {
        let executor = Arc::new(MockExecutor::new());
        let client = client(&executor);
        let error = client.get_entity_raw(&dataset_urn(), Some(&[])).unwrap_err();
        assert!(matches!(error, CatalogError::InvalidRequest(_)));
        assert!(executor.requests().is_empty());
    }

    #[test]
    fn entity_raw_encodes_aspect_list_parameter() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(json!({}));
        let client = client(&executor);
        client
            .get_entity_raw(&dataset_urn(), Some(&["status", "ownership"]))
            .unwrap();
        let requests = executor.requests();
        assert!(requests[0].url.ends_with("?aspects=List(status,ownership)"));
    }

    fn timeseries_response(values: Vec<Value>) -> Value {
        json!({ "value": { "values": values } })
    }

    #[test]
    fn latest_timeseries_value_decodes_string_payload() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(timeseries_response(vec![json!({
            "aspect": { "value": "{\"timestampMillis\": 1700000000000, \"uniqueUserCount\": 2}" }
        })]));
        let client = client(&executor);

        let value: Option<DatasetUsageStatistics> = client
            .get_latest_timeseries_value(&dataset_urn(), &BTreeMap::new())
            .unwrap();
        let value = value.unwrap();
        assert_eq!(value.timestamp_millis, 1_700_000_000_000);
        assert_eq!(value.unique_user_count, Some(2));

        let body = executor.requests()[0].body.clone().unwrap();
        assert_eq!(body["limit"], 1);
        assert_eq!(body["entity"], "dataset");
        assert_eq!(body["aspect"], "datasetUsageStatistics");
    }

    #[test]
    fn latest_timeseries_value_sends_equality_filter() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(timeseries_response(vec![]));
        let client = client(&executor);

        let mut criteria = BTreeMap::new();
        criteria.insert("pipelineName".to_string(), "nightly".to_string());
        let value: Option<DatasetUsageStatistics> = client
            .get_latest_timeseries_value(&dataset_urn(), &criteria)
            .unwrap();
        assert!(value.is_none());

        let body = executor.requests()[0].body.clone().unwrap();
        let rule = &body["filter"]["or"][0]["and"][0];
        assert_eq!(rule["field"], "pipelineName");
        assert_eq!(rule["value"], "nightly");
        assert_eq!(rule["condition"], "EQUAL");
    }

    #[test]
    fn more_than_one_timeseries_value_violates_the_protocol() {
        let executor = Arc::new(MockExecutor::new());
        let record = json!({ "aspect": { "value": "{\"timestampMillis\": 1}" } });
        executor.push_ok(timeseries_response(vec![record.clone(), record]));
        let client = client(&executor);

        let error = client
            .get_latest_timeseries_value::<DatasetUsageStatistics>(&dataset_urn(), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(error, CatalogError::InvalidResponse(_)));
    }

    #[test]
    fn snapshot_kind_is_rejected_on_the_timeseries_path() {
        let executor = Arc::new(MockExecutor::new());
        let client = client(&executor);
        let error = client
            .get_latest_timeseries_value::<EntityStatus>(&dataset_urn(), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(error, CatalogError::InvalidRequest(_)));
        assert!(executor.requests().is_empty());
    }

    #[test]
    fn usage_aspects_are_best_effort() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_err(RestError::Transport("connection refused".to_string()));
        let client = client(&executor);
        assert_eq!(client.get_usage_aspects(&dataset_urn(), 0, 100), None);
    }

    #[test]
    fn usage_aspects_skip_records_without_payload() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(timeseries_response(vec![
            json!({ "aspect": {} }),
            json!({ "aspect": { "value": "{\"timestampMillis\": 5}" } }),
        ]));
        let client = client(&executor);
        let usage = client.get_usage_aspects(&dataset_urn(), 0, 100).unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].timestamp_millis, 5);
    }

    #[test]
    fn aspect_counts_parse_the_value_field() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_ok(json!({ "value": 42 }));
        let client = client(&executor);
        let count = client
            .get_aspect_counts("status", Some("urn:lode:dataset:%"))
            .unwrap();
        assert_eq!(count, 42);
        let body = executor.requests()[0].body.clone().unwrap();
        assert_eq!(body["urnLike"], "urn:lode:dataset:%");
    }
}

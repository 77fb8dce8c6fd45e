//! Search filter expressions.
//!
//! The catalog's search index accepts a disjunction of conjunctions:
//! `OR(AND(rule*)*)`. Rules within one AND-clause must all hold; the clauses
//! of the OR are alternatives. The wire shape is irregular (singular `value`
//! vs. plural `values`, optional `condition`, optional `negated`), so
//! [`FilterRule`] skips absent fields rather than serializing defaults.

use crate::urn::Urn;
use serde::{Deserialize, Serialize};

/// Comparison operator of a filter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterCondition {
    Equal,
    Contain,
    StartWith,
    GreaterThan,
    LessThan,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One condition on an indexed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub condition: Option<FilterCondition>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub negated: bool,
}

impl FilterRule {
    /// Equality on a single value, carried in the singular `value` field.
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: Some(value.into()),
            values: Vec::new(),
            condition: Some(FilterCondition::Equal),
            negated: false,
        }
    }

    /// Equality against a value list, carried in the plural `values` field.
    pub fn equals_any(field: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            value: None,
            values,
            condition: Some(FilterCondition::Equal),
            negated: false,
        }
    }

    /// A bare field/value pair with no operator, as some legacy index fields
    /// expect.
    pub fn property(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: Some(value.into()),
            values: Vec::new(),
            condition: None,
            negated: false,
        }
    }

    /// Negates this rule.
    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }
}

/// A conjunction of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndClause {
    pub and: Vec<FilterRule>,
}

impl AndClause {
    pub fn new(and: Vec<FilterRule>) -> Self {
        Self { and }
    }
}

/// A full filter expression: a disjunction of AND-clauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub or: Vec<AndClause>,
}

impl Filter {
    /// A filter matching entities that satisfy all of `rules`.
    pub fn conjunction(rules: Vec<FilterRule>) -> Self {
        Self {
            or: vec![AndClause::new(rules)],
        }
    }
}

/// Deletion status to search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovedStatusFilter {
    /// Only entities that have not been soft-deleted.
    #[default]
    NotSoftDeleted,
    /// All entities, soft-deleted ones included.
    All,
    /// Only soft-deleted entities.
    OnlySoftDeleted,
}

/// Translates a domain-style entity type name into the search API's
/// enumerated type name.
///
/// `corpuser` is a hard-coded historical alias; everything else is camelCase
/// split into UPPER_SNAKE with the catalog's own namespace prefix stripped.
pub fn search_entity_type(entity_type: &str) -> String {
    if entity_type == "corpuser" {
        return "CORP_USER".to_string();
    }

    let mut name = String::with_capacity(entity_type.len() + 4);
    for c in entity_type.chars() {
        if c.is_uppercase() {
            name.push('_');
            name.extend(c.to_lowercase());
        } else {
            name.push(c);
        }
    }
    let mut name = name.trim_start_matches('_').to_uppercase();

    if let Some(stripped) = name.strip_prefix("LODESTONE_") {
        name = stripped.to_string();
    }

    name
}

/// Field holding the normalized platform urn in the search index.
const PLATFORM_FIELD: &str = "platform.keyword";
/// Field holding the soft-deletion flag in the search index.
const REMOVED_FIELD: &str = "removed";
/// Field most entity types store their environment under.
const ORIGIN_FIELD: &str = "origin";
/// Property bag some entity types encode their environment into instead.
const CUSTOM_PROPERTIES_FIELD: &str = "customProperties";

/// Builds the OR-of-AND filter expression for an entity search.
///
/// Platform and deletion status are plain conjunctive rules. The environment
/// is stored in one of three places depending on entity kind and age, so an
/// env filter distributes over the existing clauses: the result is the
/// cartesian product of each AND-clause with each of the three environment
/// encodings. With no other rules the product degenerates to three
/// single-rule clauses.
pub fn build_or_filters(
    platform: Option<&str>,
    env: Option<&str>,
    status: RemovedStatusFilter,
) -> Vec<AndClause> {
    let mut and_rules: Vec<FilterRule> = Vec::new();

    if let Some(platform) = platform {
        and_rules.push(FilterRule::equals_any(
            PLATFORM_FIELD,
            vec![Urn::data_platform(platform).to_string()],
        ));
    }

    match status {
        RemovedStatusFilter::NotSoftDeleted => {
            // Entities without a status aspect have no "removed" field in the
            // index at all, so "removed != true" must be a negated match
            // rather than a match on "false".
            and_rules.push(
                FilterRule::equals_any(REMOVED_FIELD, vec!["true".to_string()]).negated(),
            );
        }
        RemovedStatusFilter::OnlySoftDeleted => {
            and_rules.push(FilterRule::equals_any(
                REMOVED_FIELD,
                vec!["true".to_string()],
            ));
        }
        RemovedStatusFilter::All => {}
    }

    let mut or_filters = vec![AndClause::new(and_rules)];

    if let Some(env) = env {
        let env_conditions = [
            // Most entity types index the environment directly.
            FilterRule::equals(ORIGIN_FIELD, env),
            // Containers carry it in the property bag; newer producers write
            // "env", older ones wrote "instance".
            FilterRule::property(CUSTOM_PROPERTIES_FIELD, format!("env={env}")),
            FilterRule::property(CUSTOM_PROPERTIES_FIELD, format!("instance={env}")),
        ];

        // An entity matches when its existing AND-rules hold and at least one
        // environment encoding matches: distribute the disjunction.
        let expanded = env_conditions
            .iter()
            .flat_map(|extra| {
                or_filters.iter().map(move |clause| {
                    let mut and = clause.and.clone();
                    and.push(extra.clone());
                    AndClause::new(and)
                })
            })
            .collect();
        or_filters = expanded;
    }

    or_filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn removed_rules(clause: &AndClause) -> Vec<&FilterRule> {
        clause
            .and
            .iter()
            .filter(|rule| rule.field == REMOVED_FIELD)
            .collect()
    }

    #[test]
    fn entity_type_translation() {
        assert_eq!(search_entity_type("corpuser"), "CORP_USER");
        assert_eq!(search_entity_type("dataset"), "DATASET");
        assert_eq!(search_entity_type("corpGroup"), "CORP_GROUP");
        assert_eq!(search_entity_type("glossaryTerm"), "GLOSSARY_TERM");
        assert_eq!(
            search_entity_type("lodestoneIngestionSource"),
            "INGESTION_SOURCE"
        );
    }

    #[test]
    fn status_all_adds_no_removed_rule() {
        let filters = build_or_filters(None, None, RemovedStatusFilter::All);
        assert_eq!(filters.len(), 1);
        assert!(removed_rules(&filters[0]).is_empty());
    }

    #[test]
    fn status_not_soft_deleted_adds_one_negated_rule() {
        let filters = build_or_filters(None, None, RemovedStatusFilter::NotSoftDeleted);
        assert_eq!(filters.len(), 1);
        let rules = removed_rules(&filters[0]);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].negated);
        assert_eq!(rules[0].values, vec!["true".to_string()]);
    }

    #[test]
    fn status_only_soft_deleted_adds_one_plain_rule() {
        let filters = build_or_filters(None, None, RemovedStatusFilter::OnlySoftDeleted);
        let rules = removed_rules(&filters[0]);
        assert_eq!(rules.len(), 1);
        assert!(!rules[0].negated);
    }

    #[test]
    fn platform_rule_normalizes_to_urn() {
        let filters = build_or_filters(Some("snowflake"), None, RemovedStatusFilter::All);
        assert_eq!(filters[0].and.len(), 1);
        let rule = &filters[0].and[0];
        assert_eq!(rule.field, PLATFORM_FIELD);
        assert_eq!(rule.values, vec!["urn:lode:dataPlatform:snowflake".to_string()]);
    }

    #[test]
    fn env_filter_triples_the_clauses_and_preserves_rules() {
        let filters = build_or_filters(
            Some("snowflake"),
            Some("PROD"),
            RemovedStatusFilter::NotSoftDeleted,
        );
        // One base clause, tripled by the three environment encodings.
        assert_eq!(filters.len(), 3);
        for clause in &filters {
            // platform + removed + one env encoding
            assert_eq!(clause.and.len(), 3);
            assert_eq!(clause.and[0].field, PLATFORM_FIELD);
            assert_eq!(clause.and[1].field, REMOVED_FIELD);
        }
        let env_fields: Vec<&str> = filters
            .iter()
            .map(|clause| clause.and[2].field.as_str())
            .collect();
        assert!(env_fields.contains(&ORIGIN_FIELD));
        assert_eq!(
            env_fields
                .iter()
                .filter(|f| **f == CUSTOM_PROPERTIES_FIELD)
                .count(),
            2
        );
    }

    #[test]
    fn env_filter_over_empty_clause() {
        // No platform or status rules at all: the cartesian product
        // degenerates to three single-rule clauses.
        let filters = build_or_filters(None, Some("DEV"), RemovedStatusFilter::All);
        assert_eq!(filters.len(), 3);
        for clause in &filters {
            assert_eq!(clause.and.len(), 1);
        }
        assert_eq!(filters[0].and[0].value.as_deref(), Some("DEV"));
        assert_eq!(filters[1].and[0].value.as_deref(), Some("env=DEV"));
        assert_eq!(filters[2].and[0].value.as_deref(), Some("instance=DEV"));
    }

    #[test]
    fn rule_serialization_skips_absent_fields() {
        let negated = FilterRule::equals_any("removed", vec!["true".to_string()]).negated();
        assert_eq!(
            serde_json::to_value(&negated).unwrap(),
            json!({
                "field": "removed",
                "values": ["true"],
                "condition": "EQUAL",
                "negated": true,
            })
        );

        let bare = FilterRule::property("customProperties", "env=PROD");
        assert_eq!(
            serde_json::to_value(&bare).unwrap(),
            json!({
                "field": "customProperties",
                "value": "env=PROD",
            })
        );
    }

    #[test]
    fn conjunction_wraps_rules_in_single_or_clause() {
        let filter = Filter::conjunction(vec![FilterRule::equals("name", "sales")]);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["or"].as_array().unwrap().len(), 1);
        assert_eq!(json["or"][0]["and"][0]["field"], "name");
    }
}

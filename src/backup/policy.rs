//! Selection and import option value objects.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::backup::EntityKind;

/// Per-kind cap applied when the caller does not specify one.
pub const DEFAULT_MAX_RECORDS: i64 = 1000;

/// What to export: per-kind inclusion plus optional filters. Kinds absent
/// from `entities` (or mapped to `false`) are excluded entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPolicy {
    #[serde(default)]
    pub entities: BTreeMap<EntityKind, bool>,
    /// Lower bound on the record creation timestamp.
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    /// Upper bound on the record creation timestamp.
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
    /// Restrict to records authored/owned by this user, for kinds that have
    /// an author or owner.
    #[serde(default)]
    pub author_id: Option<i32>,
    /// Per-kind record cap. Bounds each kind independently, never the
    /// aggregate.
    #[serde(default)]
    pub max_records: Option<i64>,
}

impl SelectionPolicy {
    pub fn includes(&self, kind: EntityKind) -> bool {
        self.entities.get(&kind).copied().unwrap_or(false)
    }

    /// Included kinds in canonical order.
    pub fn included_kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.includes(*kind))
            .collect()
    }

    /// Effective per-kind cap: defaults to [`DEFAULT_MAX_RECORDS`], never
    /// below 1.
    pub fn max_records(&self) -> i64 {
        self.max_records.unwrap_or(DEFAULT_MAX_RECORDS).max(1)
    }

    /// The filter handed to every repository read for this policy.
    pub fn filter(&self) -> SelectionFilter {
        SelectionFilter {
            date_from: self.date_from,
            date_to: self.date_to,
            author_id: self.author_id,
            limit: self.max_records(),
        }
    }
}

/// Filters applied by repository reads. Repositories for kinds without an
/// author/owner column ignore `author_id`.
#[derive(Debug, Clone, Copy)]
pub struct SelectionFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub author_id: Option<i32>,
    pub limit: i64,
}

/// What to import: a kind must be explicitly mapped to `true` to be touched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    #[serde(default)]
    pub entities: BTreeMap<EntityKind, bool>,
    /// When an inbound record matches an existing one: `false` skips it,
    /// `true` updates the existing record in place.
    #[serde(default)]
    pub replace_existing: bool,
}

impl ImportOptions {
    pub fn includes(&self, kind: EntityKind) -> bool {
        self.entities.get(&kind).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_includes_nothing() {
        let policy: SelectionPolicy = serde_json::from_str("{}").expect("parse");
        assert!(policy.included_kinds().is_empty());
        assert_eq!(policy.max_records(), DEFAULT_MAX_RECORDS);
    }

    #[test]
    fn policy_parses_wire_names_and_filters() {
        let policy: SelectionPolicy = serde_json::from_value(serde_json::json!({
            "entities": { "jobOffers": true, "categories": true, "posts": false },
            "dateFrom": "2025-01-01T00:00:00Z",
            "maxRecords": 50
        }))
        .expect("parse");

        assert_eq!(
            policy.included_kinds(),
            vec![EntityKind::Categories, EntityKind::JobOffers]
        );
        assert!(!policy.includes(EntityKind::Posts));
        assert!(!policy.includes(EntityKind::Users));
        assert_eq!(policy.filter().limit, 50);
        assert!(policy.filter().date_from.is_some());
        assert!(policy.filter().date_to.is_none());
    }

    #[test]
    fn max_records_is_clamped_to_at_least_one() {
        let policy = SelectionPolicy {
            max_records: Some(-5),
            ..Default::default()
        };
        assert_eq!(policy.max_records(), 1);
    }

    #[test]
    fn import_options_default_to_no_replace() {
        let options: ImportOptions =
            serde_json::from_value(serde_json::json!({ "entities": { "users": true } }))
                .expect("parse");
        assert!(options.includes(EntityKind::Users));
        assert!(!options.includes(EntityKind::Categories));
        assert!(!options.replace_existing);
    }
}

//! The portable backup document format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::backup::EntityKind;

/// Version tag stamped into exported documents. Carried on import but not
/// migrated: the format is append-only within a major version.
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// Human label identifying the exporting platform.
pub const PLATFORM_LABEL: &str = "Agora Social Network";

/// A self-contained export of the selected collections. The document itself
/// is the wire format: callers may serve it directly as a downloadable file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub export_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub platform: String,
    /// Snapshots per kind. Kinds excluded by the selection policy are absent,
    /// not present with an empty list.
    pub data: BTreeMap<EntityKind, Vec<JsonValue>>,
    /// Record counts per kind. Always equal to the lengths in `data` for
    /// exported documents; informational on inbound ones.
    #[serde(default)]
    pub statistics: BTreeMap<EntityKind, i64>,
}

impl BackupDocument {
    /// Assemble a document from collector output. Stamps version, export
    /// date and platform label, and derives `statistics` from `data` so the
    /// two can never disagree.
    pub fn build(data: BTreeMap<EntityKind, Vec<JsonValue>>) -> Self {
        let statistics = data
            .iter()
            .map(|(kind, records)| (*kind, records.len() as i64))
            .collect();

        Self {
            version: BACKUP_FORMAT_VERSION.to_string(),
            export_date: Some(Utc::now()),
            platform: PLATFORM_LABEL.to_string(),
            data,
            statistics,
        }
    }

    /// Snapshots for one kind, if the document carries any.
    pub fn records(&self, kind: EntityKind) -> Option<&[JsonValue]> {
        self.data.get(&kind).map(|records| records.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statistics_are_derived_from_data() {
        let mut data = BTreeMap::new();
        data.insert(
            EntityKind::Categories,
            vec![json!({"name": "Tecnologia"}), json!({"name": "Marketing"})],
        );
        data.insert(EntityKind::Users, vec![json!({"email": "a@example.com"})]);

        let document = BackupDocument::build(data);

        assert_eq!(document.version, BACKUP_FORMAT_VERSION);
        assert_eq!(document.platform, PLATFORM_LABEL);
        assert!(document.export_date.is_some());
        assert_eq!(document.statistics[&EntityKind::Categories], 2);
        assert_eq!(document.statistics[&EntityKind::Users], 1);
        assert!(!document.statistics.contains_key(&EntityKind::Posts));
    }

    #[test]
    fn serializes_kinds_with_wire_names() {
        let mut data = BTreeMap::new();
        data.insert(EntityKind::JobOffers, vec![json!({"title": "Backend Dev"})]);
        let document = BackupDocument::build(data);

        let value = serde_json::to_value(&document).expect("serialize");
        assert!(value["data"]["jobOffers"].is_array());
        assert_eq!(value["statistics"]["jobOffers"], 1);
    }
}

//! Selection-driven collection and count-only preview.

use std::collections::BTreeMap;

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::backup::{BackupDocument, EntityKind, SelectionPolicy};
use crate::store::BackupRegistry;

/// Count-only answer to "how much would this selection export".
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub statistics: BTreeMap<EntityKind, i64>,
    pub total_records: i64,
}

/// Runs the repository registry against a selection policy. A failure for
/// one kind is logged and reported as an empty result for that kind; the
/// remaining kinds still run.
pub struct Collector<'a> {
    registry: &'a BackupRegistry,
}

impl<'a> Collector<'a> {
    pub fn new(registry: &'a BackupRegistry) -> Self {
        Self { registry }
    }

    /// Materialize snapshots for every included kind.
    pub async fn collect(
        &self,
        policy: &SelectionPolicy,
    ) -> BTreeMap<EntityKind, Vec<JsonValue>> {
        let filter = policy.filter();
        let mut data = BTreeMap::new();

        for kind in policy.included_kinds() {
            let Some(repo) = self.registry.get(kind) else {
                log::warn!("no repository registered for {kind}, exporting empty set");
                data.insert(kind, Vec::new());
                continue;
            };

            match repo.collect(&filter).await {
                Ok(records) => {
                    log::debug!("collected {} {kind} records", records.len());
                    data.insert(kind, records);
                }
                Err(err) => {
                    log::warn!("collect failed for {kind}: {err}");
                    data.insert(kind, Vec::new());
                }
            }
        }

        data
    }

    /// Build a complete backup document for the selection.
    pub async fn export(&self, policy: &SelectionPolicy) -> BackupDocument {
        BackupDocument::build(self.collect(policy).await)
    }

    /// Count-only pass with the same filter semantics as [`collect`].
    /// Cheap enough to re-run on every selection change in the console.
    ///
    /// [`collect`]: Collector::collect
    pub async fn preview(&self, policy: &SelectionPolicy) -> PreviewReport {
        let filter = policy.filter();
        let mut statistics = BTreeMap::new();
        let mut total_records = 0;

        for kind in policy.included_kinds() {
            let count = match self.registry.get(kind) {
                Some(repo) => match repo.count(&filter).await {
                    Ok(count) => count.min(filter.limit),
                    Err(err) => {
                        log::warn!("count failed for {kind}: {err}");
                        0
                    }
                },
                None => {
                    log::warn!("no repository registered for {kind}");
                    0
                }
            };

            statistics.insert(kind, count);
            total_records += count;
        }

        PreviewReport {
            statistics,
            total_records,
        }
    }
}

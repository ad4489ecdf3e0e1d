//! End-to-end import driver.

use std::collections::BTreeMap;
use std::sync::Arc;

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::task::JoinSet;

use crate::backup::hierarchy::tier_by_parent_chain;
use crate::backup::reconcile::{ReconcileAction, reconcile_record};
use crate::backup::{BackupDocument, EntityKind, ImportOptions, RecordError};
use crate::store::{BackupRegistry, EntityRepository};

/// Bounded concurrency within one category depth tier. Reads and writes are
/// I/O-bound, so a small pool is enough to hide round-trip latency.
const TIER_WORKERS: usize = 8;

/// Outcome tally for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KindCounters {
    pub created: i64,
    pub updated: i64,
    pub skipped: i64,
    pub errors: i64,
}

impl KindCounters {
    fn apply(&mut self, action: ReconcileAction) {
        match action {
            ReconcileAction::Created => self.created += 1,
            ReconcileAction::Updated => self.updated += 1,
            ReconcileAction::Skipped => self.skipped += 1,
        }
    }

    fn record_failure(&mut self, kind: EntityKind, err: &RecordError) {
        log::warn!("{kind} record failed: {err}");
        self.errors += 1;
    }
}

/// Per-kind outcome counters. Kinds not selected for import are absent.
pub type ImportResult = BTreeMap<EntityKind, KindCounters>;

/// Drives a validated backup document into the target store.
///
/// Kinds run in dependency-stage order so natural-key references resolve;
/// categories additionally run tier by tier, parents before children. Every
/// record failure is confined to its own counter slot — the surrounding loop
/// and the other kinds continue regardless.
pub struct ImportOrchestrator {
    registry: Arc<BackupRegistry>,
}

impl ImportOrchestrator {
    pub fn new(registry: Arc<BackupRegistry>) -> Self {
        Self { registry }
    }

    /// Import every kind selected by `options` that is present in the
    /// document. Unselected kinds are never read, let alone written.
    pub async fn run(&self, document: &BackupDocument, options: &ImportOptions) -> ImportResult {
        let mut results = ImportResult::new();

        for stage in EntityKind::IMPORT_STAGES {
            for &kind in stage {
                if !options.includes(kind) {
                    continue;
                }
                let Some(records) = document.records(kind) else {
                    continue;
                };
                let Some(repo) = self.registry.get(kind) else {
                    log::warn!("no repository registered for {kind}, skipping import");
                    continue;
                };

                let counters = if kind == EntityKind::Categories {
                    self.import_tiered(repo, records, options.replace_existing)
                        .await
                } else {
                    self.import_sequential(repo, records, options.replace_existing)
                        .await
                };

                log::info!(
                    "imported {kind}: {} created, {} updated, {} skipped, {} errors",
                    counters.created,
                    counters.updated,
                    counters.skipped,
                    counters.errors
                );
                results.insert(kind, counters);
            }
        }

        results
    }

    async fn import_sequential(
        &self,
        repo: &Arc<dyn EntityRepository>,
        records: &[JsonValue],
        replace_existing: bool,
    ) -> KindCounters {
        let mut counters = KindCounters::default();

        for record in records {
            match reconcile_record(repo.as_ref(), record, replace_existing).await {
                Ok(action) => counters.apply(action),
                Err(err) => counters.record_failure(repo.kind(), &err),
            }
        }

        counters
    }

    /// Tier-ordered import for the self-referencing category kind. A tier
    /// barrier separates depths: tier `n+1` only starts once every record of
    /// tier `n` has committed, so in-batch parents are resolvable. Records
    /// within one tier are independent and run on a bounded worker pool.
    async fn import_tiered(
        &self,
        repo: &Arc<dyn EntityRepository>,
        records: &[JsonValue],
        replace_existing: bool,
    ) -> KindCounters {
        let mut counters = KindCounters::default();
        let tiered = tier_by_parent_chain(records);
        counters.errors += tiered.malformed as i64;

        for tier in tiered.tiers {
            let mut workers: JoinSet<Result<ReconcileAction, RecordError>> = JoinSet::new();
            let mut pending = tier.into_iter();

            loop {
                while workers.len() < TIER_WORKERS {
                    let Some(record) = pending.next() else {
                        break;
                    };
                    let repo = Arc::clone(repo);
                    workers.spawn(async move {
                        reconcile_record(repo.as_ref(), &record, replace_existing).await
                    });
                }

                match workers.join_next().await {
                    Some(Ok(Ok(action))) => counters.apply(action),
                    Some(Ok(Err(err))) => counters.record_failure(repo.kind(), &err),
                    Some(Err(join_err)) => {
                        log::error!("category import worker panicked: {join_err}");
                        counters.errors += 1;
                    }
                    None => break,
                }
            }
        }

        counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::testing::MemoryRepository;
    use crate::backup::{Collector, SelectionPolicy};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn category_registry() -> (Arc<MemoryRepository>, Arc<BackupRegistry>) {
        let repo = Arc::new(MemoryRepository::categories());
        let registry = Arc::new(BackupRegistry::from_repos(vec![repo.clone()]));
        (repo, registry)
    }

    fn options(kinds: &[EntityKind], replace_existing: bool) -> ImportOptions {
        ImportOptions {
            entities: kinds.iter().map(|&kind| (kind, true)).collect(),
            replace_existing,
        }
    }

    fn document_with(kind: EntityKind, records: Vec<serde_json::Value>) -> BackupDocument {
        let mut data = BTreeMap::new();
        data.insert(kind, records);
        BackupDocument::build(data)
    }

    #[tokio::test]
    async fn fresh_category_is_created() {
        let (repo, registry) = category_registry();
        let document = document_with(
            EntityKind::Categories,
            vec![json!({"name": "Tecnologia", "type": "company"})],
        );

        let results = ImportOrchestrator::new(registry)
            .run(&document, &options(&[EntityKind::Categories], false))
            .await;

        let counters = results[&EntityKind::Categories];
        assert_eq!(
            counters,
            KindCounters {
                created: 1,
                ..Default::default()
            }
        );
        assert_eq!(repo.stored_count(), 1);
    }

    #[tokio::test]
    async fn reimport_without_replace_skips() {
        let (repo, registry) = category_registry();
        let document = document_with(
            EntityKind::Categories,
            vec![json!({"name": "Tecnologia", "type": "company", "color": "#0044aa"})],
        );
        let orchestrator = ImportOrchestrator::new(registry);
        let opts = options(&[EntityKind::Categories], false);

        orchestrator.run(&document, &opts).await;
        let second = orchestrator.run(&document, &opts).await;

        let counters = second[&EntityKind::Categories];
        assert_eq!(
            counters,
            KindCounters {
                skipped: 1,
                ..Default::default()
            }
        );
        assert_eq!(repo.stored_count(), 1);
    }

    #[tokio::test]
    async fn replace_existing_updates_changed_fields() {
        let (repo, registry) = category_registry();
        let orchestrator = ImportOrchestrator::new(registry);

        let original = document_with(
            EntityKind::Categories,
            vec![json!({"name": "Tecnologia", "type": "company", "color": "#0044aa"})],
        );
        orchestrator
            .run(&original, &options(&[EntityKind::Categories], false))
            .await;

        let recolored = document_with(
            EntityKind::Categories,
            vec![json!({"name": "Tecnologia", "type": "company", "color": "#ff8800"})],
        );
        let results = orchestrator
            .run(&recolored, &options(&[EntityKind::Categories], true))
            .await;

        let counters = results[&EntityKind::Categories];
        assert_eq!(
            counters,
            KindCounters {
                updated: 1,
                ..Default::default()
            }
        );
        assert_eq!(repo.stored_field("Tecnologia", "color"), json!("#ff8800"));
    }

    #[tokio::test]
    async fn unresolved_parent_counts_one_error_and_spares_siblings() {
        let (repo, registry) = category_registry();
        let document = document_with(
            EntityKind::Categories,
            vec![
                json!({"name": "Marketing", "type": "company"}),
                json!({"name": "Orphan", "type": "company", "parent": ["Nowhere"]}),
            ],
        );

        let results = ImportOrchestrator::new(registry)
            .run(&document, &options(&[EntityKind::Categories], false))
            .await;

        let counters = results[&EntityKind::Categories];
        assert_eq!(
            counters,
            KindCounters {
                created: 1,
                errors: 1,
                ..Default::default()
            }
        );
        assert_eq!(repo.stored_count(), 1);
    }

    #[tokio::test]
    async fn child_listed_before_parent_still_imports_in_one_pass() {
        let (repo, registry) = category_registry();
        let document = document_with(
            EntityKind::Categories,
            vec![
                json!({"name": "Backend", "type": "company", "parent": ["Tecnologia", "Software"]}),
                json!({"name": "Software", "type": "company", "parent": ["Tecnologia"]}),
                json!({"name": "Tecnologia", "type": "company"}),
            ],
        );

        let results = ImportOrchestrator::new(registry)
            .run(&document, &options(&[EntityKind::Categories], false))
            .await;

        let counters = results[&EntityKind::Categories];
        assert_eq!(
            counters,
            KindCounters {
                created: 3,
                ..Default::default()
            }
        );
        assert_eq!(repo.stored_count(), 3);
    }

    #[tokio::test]
    async fn one_failing_record_does_not_stop_the_rest() {
        let repo = Arc::new(
            MemoryRepository::new(EntityKind::Users, &["email"]).failing_on("broken@example.com"),
        );
        let registry = Arc::new(BackupRegistry::from_repos(vec![repo.clone()]));

        let document = document_with(
            EntityKind::Users,
            vec![
                json!({"username": "ada", "email": "ada@example.com"}),
                json!({"username": "bad", "email": "broken@example.com"}),
                json!({"username": "carl", "email": "carl@example.com"}),
            ],
        );

        let results = ImportOrchestrator::new(registry)
            .run(&document, &options(&[EntityKind::Users], false))
            .await;

        let counters = results[&EntityKind::Users];
        assert_eq!(
            counters,
            KindCounters {
                created: 2,
                errors: 1,
                ..Default::default()
            }
        );
        assert_eq!(repo.stored_count(), 2);
    }

    #[tokio::test]
    async fn unselected_kinds_are_never_touched() {
        let categories = Arc::new(MemoryRepository::categories());
        let users = Arc::new(MemoryRepository::new(EntityKind::Users, &["email"]));
        let registry = Arc::new(BackupRegistry::from_repos(vec![
            categories.clone(),
            users.clone(),
        ]));

        let mut data = BTreeMap::new();
        data.insert(
            EntityKind::Categories,
            vec![json!({"name": "Tecnologia", "type": "company"})],
        );
        data.insert(
            EntityKind::Users,
            vec![json!({"username": "ada", "email": "ada@example.com"})],
        );
        let document = BackupDocument::build(data);

        let results = ImportOrchestrator::new(registry)
            .run(&document, &options(&[EntityKind::Categories], false))
            .await;

        assert!(results.contains_key(&EntityKind::Categories));
        assert!(!results.contains_key(&EntityKind::Users));
        assert_eq!(users.op_count(), 0);
        assert_eq!(users.stored_count(), 0);
    }

    #[tokio::test]
    async fn export_then_double_import_ends_all_skipped() {
        let (source_repo, source_registry) = category_registry();
        source_repo.seed(vec![
            json!({"name": "Tecnologia", "type": "company"}),
            json!({"name": "Software", "type": "company", "parent": ["Tecnologia"]}),
        ]);

        let policy = SelectionPolicy {
            entities: [(EntityKind::Categories, true)].into_iter().collect(),
            ..Default::default()
        };
        let collector = Collector::new(&source_registry);
        let preview = collector.preview(&policy).await;
        let document = collector.export(&policy).await;

        // Preview counts match what export materialized.
        assert_eq!(
            preview.statistics[&EntityKind::Categories],
            document.statistics[&EntityKind::Categories]
        );
        assert_eq!(preview.total_records, 2);

        let (_target_repo, target_registry) = category_registry();
        let orchestrator = ImportOrchestrator::new(target_registry);
        let opts = options(&[EntityKind::Categories], false);

        let first = orchestrator.run(&document, &opts).await;
        assert_eq!(first[&EntityKind::Categories].created, 2);

        let second = orchestrator.run(&document, &opts).await;
        assert_eq!(
            second[&EntityKind::Categories],
            KindCounters {
                skipped: 2,
                ..Default::default()
            }
        );
    }
}

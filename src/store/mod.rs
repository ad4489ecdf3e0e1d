//! Repository layer over the platform collections.
//!
//! Each backup-eligible kind gets one repository object implementing
//! [`EntityRepository`]; the engine only ever sees the trait, so it can run
//! against Postgres-backed repositories in production and an in-memory
//! implementation in unit tests. Adding a kind means adding one repository
//! and one registry entry, not new branches in the orchestrator.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::backup::{BackupError, EntityKind, RecordError, SelectionFilter};

pub mod categories;
pub mod companies;
pub mod content;
pub mod email_templates;
pub mod groups;
pub mod jobs;
pub mod migrations;
pub mod posts;
pub mod users;

pub use migrations::{reset_database, run_migrations};

/// Per-kind storage strategy: filtered collection for export, natural-key
/// matching and create/update for import.
#[rocket::async_trait]
pub trait EntityRepository: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Read snapshots matching the filter, at most `filter.limit` of them.
    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError>;

    /// Count records matching the filter without materializing them.
    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError>;

    /// Look up the target-store id of the record this snapshot describes,
    /// using the kind's natural key.
    async fn find_existing(&self, record: &JsonValue) -> Result<Option<i32>, RecordError>;

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError>;

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError>;
}

/// The typed registry mapping each entity kind to its repository.
pub struct BackupRegistry {
    repos: BTreeMap<EntityKind, Arc<dyn EntityRepository>>,
}

impl BackupRegistry {
    /// Registry over Postgres-backed repositories for every kind.
    pub fn for_pool(pool: &PgPool) -> Self {
        Self::from_repos(vec![
            Arc::new(users::UserRepository::new(pool.clone())),
            Arc::new(categories::CategoryRepository::new(pool.clone())),
            Arc::new(companies::CompanyRepository::new(pool.clone())),
            Arc::new(groups::GroupRepository::new(pool.clone())),
            Arc::new(posts::PostRepository::new(pool.clone())),
            Arc::new(jobs::JobOfferRepository::new(pool.clone())),
            Arc::new(content::AnnouncementRepository::new(pool.clone())),
            Arc::new(content::AdvisoryRepository::new(pool.clone())),
            Arc::new(content::BlogRepository::new(pool.clone())),
            Arc::new(email_templates::EmailTemplateRepository::new(pool.clone())),
        ])
    }

    /// Registry over an explicit repository set. Used by tests; a partial
    /// registry simply leaves the missing kinds uncollectable.
    pub fn from_repos(repos: Vec<Arc<dyn EntityRepository>>) -> Self {
        Self {
            repos: repos.into_iter().map(|repo| (repo.kind(), repo)).collect(),
        }
    }

    pub fn get(&self, kind: EntityKind) -> Option<&Arc<dyn EntityRepository>> {
        self.repos.get(&kind)
    }
}

/// Resolve a user reference carried as an email address. `Ok(None)` means the
/// email is unknown in the target store.
pub(crate) async fn resolve_user_id(
    pool: &PgPool,
    email: &str,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Resolve an optional author/owner email into an id, mapping an unknown
/// email to an `UnresolvedReference` record error.
pub(crate) async fn resolve_optional_author(
    pool: &PgPool,
    email: Option<&str>,
    role: &str,
) -> Result<Option<i32>, RecordError> {
    match email {
        None => Ok(None),
        Some(email) => resolve_user_id(pool, email)
            .await?
            .map(Some)
            .ok_or_else(|| {
                RecordError::UnresolvedReference(format!("{role} '{email}' not found"))
            }),
    }
}

/// Resolve a required author email into an id.
pub(crate) async fn resolve_required_author(
    pool: &PgPool,
    email: &str,
    role: &str,
) -> Result<i32, RecordError> {
    resolve_user_id(pool, email).await?.ok_or_else(|| {
        RecordError::UnresolvedReference(format!("{role} '{email}' not found"))
    })
}

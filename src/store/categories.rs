//! Category repository.
//!
//! Categories form a tree via `parent_id`. Portable snapshots carry the
//! parent as a name chain from the root instead of an id, so a document
//! exported from one instance resolves against another. The whole table is
//! small enough to load into a [`CategoryArena`] for path computation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::backup::hierarchy::{CategoryArena, CategoryNode};
use crate::backup::{BackupError, EntityKind, RecordError, SelectionFilter};
use crate::models::Category;
use crate::store::EntityRepository;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategorySnapshot {
    name: String,
    #[serde(rename = "type")]
    category_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Ancestor names, root first. Absent for root categories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parent: Vec<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Arena over the whole category table.
    pub async fn arena(&self) -> Result<CategoryArena, BackupError> {
        let rows: Vec<(i32, String, String, Option<i32>)> =
            sqlx::query_as("SELECT id, name, category_type, parent_id FROM categories")
                .fetch_all(&self.pool)
                .await?;

        Ok(CategoryArena::new(rows.into_iter().map(
            |(id, name, category_type, parent_id)| CategoryNode {
                id,
                name,
                category_type,
                parent_id,
            },
        )))
    }

    /// Resolve a parent name chain to a category id by walking it from the
    /// root. `Ok(None)` means the snapshot is a root; a chain link missing
    /// from the store is an unresolved reference.
    async fn resolve_chain(
        &self,
        chain: &[String],
        category_type: &str,
    ) -> Result<Option<i32>, RecordError> {
        let mut parent_id: Option<i32> = None;

        for name in chain {
            let found: Option<i32> = sqlx::query_scalar(
                r#"SELECT id FROM categories
                   WHERE lower(name) = lower($1)
                     AND category_type = $2
                     AND parent_id IS NOT DISTINCT FROM $3"#,
            )
            .bind(name)
            .bind(category_type)
            .bind(parent_id)
            .fetch_optional(&self.pool)
            .await?;

            match found {
                Some(id) => parent_id = Some(id),
                None => {
                    return Err(RecordError::UnresolvedReference(format!(
                        "parent category '{}' ({}) not found",
                        name, category_type
                    )));
                }
            }
        }

        Ok(parent_id)
    }
}

#[rocket::async_trait]
impl EntityRepository for CategoryRepository {
    fn kind(&self) -> EntityKind {
        EntityKind::Categories
    }

    /// Loads the full table once: snapshots need their ancestor chains, and
    /// ancestors may fall outside the date filter. The filter and cap apply
    /// to the emitted snapshots only; emission order is parents-first so the
    /// exported batch already respects dependency tiers.
    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        let rows: Vec<Category> = sqlx::query_as::<_, Category>(
            r#"SELECT id, name, category_type, color, description, parent_id, created_at
               FROM categories"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let arena = CategoryArena::new(rows.iter().map(|row| CategoryNode {
            id: row.id,
            name: row.name.clone(),
            category_type: row.category_type.clone(),
            parent_id: row.parent_id,
        }));

        let mut selected: Vec<&Category> = rows
            .iter()
            .filter(|row| filter.date_from.is_none_or(|from| row.created_at >= from))
            .filter(|row| filter.date_to.is_none_or(|to| row.created_at <= to))
            .collect();
        selected.sort_by_key(|row| (arena.depth(row.id), row.id));
        selected.truncate(filter.limit as usize);

        selected
            .into_iter()
            .map(|row| {
                serde_json::to_value(CategorySnapshot {
                    name: row.name.clone(),
                    category_type: row.category_type.clone(),
                    color: row.color.clone(),
                    description: row.description.clone(),
                    parent: arena.full_path(row.id),
                    created_at: Some(row.created_at),
                })
            })
            .collect::<Result<_, _>>()
            .map_err(BackupError::from)
    }

    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM categories
               WHERE ($1::timestamptz IS NULL OR created_at >= $1)
                 AND ($2::timestamptz IS NULL OR created_at <= $2)"#,
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn find_existing(&self, record: &JsonValue) -> Result<Option<i32>, RecordError> {
        let snapshot: CategorySnapshot = serde_json::from_value(record.clone())?;

        // A record whose parent chain does not resolve cannot exist here;
        // `create` will report the unresolved reference.
        let parent_id = match self
            .resolve_chain(&snapshot.parent, &snapshot.category_type)
            .await
        {
            Ok(parent_id) => parent_id,
            Err(RecordError::UnresolvedReference(_)) => return Ok(None),
            Err(err) => return Err(err),
        };

        let id: Option<i32> = sqlx::query_scalar(
            r#"SELECT id FROM categories
               WHERE lower(name) = lower($1)
                 AND category_type = $2
                 AND parent_id IS NOT DISTINCT FROM $3"#,
        )
        .bind(&snapshot.name)
        .bind(&snapshot.category_type)
        .bind(parent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: CategorySnapshot = serde_json::from_value(record.clone())?;

        if snapshot.name.trim().is_empty() {
            return Err(RecordError::InvalidSnapshot(
                "category name must not be empty".to_string(),
            ));
        }

        let parent_id = self
            .resolve_chain(&snapshot.parent, &snapshot.category_type)
            .await?;

        sqlx::query(
            r#"INSERT INTO categories (name, category_type, color, description, parent_id, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&snapshot.name)
        .bind(&snapshot.category_type)
        .bind(&snapshot.color)
        .bind(&snapshot.description)
        .bind(parent_id)
        .bind(snapshot.created_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Name, type and parent are the record's identity; replacement only
    /// touches the presentation fields.
    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: CategorySnapshot = serde_json::from_value(record.clone())?;

        sqlx::query("UPDATE categories SET color = $1, description = $2 WHERE id = $3")
            .bind(&snapshot.color)
            .bind(&snapshot.description)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::backup::{BackupError, EntityKind, RecordError, SelectionFilter};
use crate::store::{EntityRepository, resolve_optional_author};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupSnapshot {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default = "default_visibility")]
    visibility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

fn default_visibility() -> String {
    "public".to_string()
}

pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl EntityRepository for GroupRepository {
    fn kind(&self) -> EntityKind {
        EntityKind::Groups
    }

    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        let rows: Vec<(String, Option<String>, String, Option<String>, DateTime<Utc>)> =
            sqlx::query_as(
                r#"SELECT g.name, g.description, g.visibility, u.email, g.created_at
                   FROM groups g
                   LEFT JOIN users u ON u.id = g.owner_id
                   WHERE ($1::timestamptz IS NULL OR g.created_at >= $1)
                     AND ($2::timestamptz IS NULL OR g.created_at <= $2)
                     AND ($3::int4 IS NULL OR g.owner_id = $3)
                   ORDER BY g.created_at ASC, g.id ASC
                   LIMIT $4"#,
            )
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(filter.author_id)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(name, description, visibility, owner, created_at)| {
                serde_json::to_value(GroupSnapshot {
                    name,
                    description,
                    visibility,
                    owner,
                    created_at: Some(created_at),
                })
            })
            .collect::<Result<_, _>>()
            .map_err(BackupError::from)
    }

    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM groups
               WHERE ($1::timestamptz IS NULL OR created_at >= $1)
                 AND ($2::timestamptz IS NULL OR created_at <= $2)
                 AND ($3::int4 IS NULL OR owner_id = $3)"#,
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn find_existing(&self, record: &JsonValue) -> Result<Option<i32>, RecordError> {
        let snapshot: GroupSnapshot = serde_json::from_value(record.clone())?;
        let id = sqlx::query_scalar("SELECT id FROM groups WHERE lower(name) = lower($1)")
            .bind(&snapshot.name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: GroupSnapshot = serde_json::from_value(record.clone())?;
        let owner_id =
            resolve_optional_author(&self.pool, snapshot.owner.as_deref(), "owner").await?;

        sqlx::query(
            r#"INSERT INTO groups (name, description, visibility, owner_id, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&snapshot.name)
        .bind(&snapshot.description)
        .bind(&snapshot.visibility)
        .bind(owner_id)
        .bind(snapshot.created_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: GroupSnapshot = serde_json::from_value(record.clone())?;

        sqlx::query("UPDATE groups SET description = $1, visibility = $2 WHERE id = $3")
            .bind(&snapshot.description)
            .bind(&snapshot.visibility)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::backup::{BackupError, EntityKind, RecordError, SelectionFilter};
use crate::store::{EntityRepository, resolve_required_author};

/// Posts have no storage-level uniqueness; the natural key is the most
/// conservative tuple that survives a cross-instance move: author, title
/// and creation timestamp together.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostSnapshot {
    title: String,
    body: String,
    /// Authoring member, referenced by email.
    author: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl EntityRepository for PostRepository {
    fn kind(&self) -> EntityKind {
        EntityKind::Posts
    }

    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        let rows: Vec<(String, String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"SELECT p.title, p.body, u.email, p.created_at
               FROM posts p
               JOIN users u ON u.id = p.author_id
               WHERE ($1::timestamptz IS NULL OR p.created_at >= $1)
                 AND ($2::timestamptz IS NULL OR p.created_at <= $2)
                 AND ($3::int4 IS NULL OR p.author_id = $3)
               ORDER BY p.created_at ASC, p.id ASC
               LIMIT $4"#,
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.author_id)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(title, body, author, created_at)| {
                serde_json::to_value(PostSnapshot {
                    title,
                    body,
                    author,
                    created_at: Some(created_at),
                })
            })
            .collect::<Result<_, _>>()
            .map_err(BackupError::from)
    }

    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM posts
               WHERE ($1::timestamptz IS NULL OR created_at >= $1)
                 AND ($2::timestamptz IS NULL OR created_at <= $2)
                 AND ($3::int4 IS NULL OR author_id = $3)"#,
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn find_existing(&self, record: &JsonValue) -> Result<Option<i32>, RecordError> {
        let snapshot: PostSnapshot = serde_json::from_value(record.clone())?;

        let id = sqlx::query_scalar(
            r#"SELECT p.id FROM posts p
               JOIN users u ON u.id = p.author_id
               WHERE lower(u.email) = lower($1)
                 AND lower(p.title) = lower($2)
                 AND ($3::timestamptz IS NULL OR p.created_at = $3)"#,
        )
        .bind(&snapshot.author)
        .bind(&snapshot.title)
        .bind(snapshot.created_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: PostSnapshot = serde_json::from_value(record.clone())?;
        let author_id = resolve_required_author(&self.pool, &snapshot.author, "author").await?;

        sqlx::query(
            r#"INSERT INTO posts (author_id, title, body, created_at)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(author_id)
        .bind(&snapshot.title)
        .bind(&snapshot.body)
        .bind(snapshot.created_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: PostSnapshot = serde_json::from_value(record.clone())?;

        sqlx::query("UPDATE posts SET body = $1 WHERE id = $2")
            .bind(&snapshot.body)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

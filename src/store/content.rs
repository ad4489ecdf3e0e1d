//! Repositories for the editorial collections: announcements, advisories
//! and blogs. All three are flat, author-attributed content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::backup::{BackupError, EntityKind, RecordError, SelectionFilter};
use crate::store::{EntityRepository, resolve_optional_author};

// ===== Announcements =====

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnouncementSnapshot {
    title: String,
    body: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

pub struct AnnouncementRepository {
    pool: PgPool,
}

impl AnnouncementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl EntityRepository for AnnouncementRepository {
    fn kind(&self) -> EntityKind {
        EntityKind::Announcements
    }

    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        let rows: Vec<(String, String, DateTime<Utc>, Option<String>, DateTime<Utc>)> =
            sqlx::query_as(
                r#"SELECT a.title, a.body, a.published_at, u.email, a.created_at
                   FROM announcements a
                   LEFT JOIN users u ON u.id = a.author_id
                   WHERE ($1::timestamptz IS NULL OR a.created_at >= $1)
                     AND ($2::timestamptz IS NULL OR a.created_at <= $2)
                     AND ($3::int4 IS NULL OR a.author_id = $3)
                   ORDER BY a.created_at ASC, a.id ASC
                   LIMIT $4"#,
            )
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(filter.author_id)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(title, body, published_at, author, created_at)| {
                serde_json::to_value(AnnouncementSnapshot {
                    title,
                    body,
                    published_at: Some(published_at),
                    author,
                    created_at: Some(created_at),
                })
            })
            .collect::<Result<_, _>>()
            .map_err(BackupError::from)
    }

    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM announcements
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
        let snapshot: AnnouncementSnapshot = serde_json::from_value(record.clone())?;

        let id = sqlx::query_scalar(
            r#"SELECT id FROM announcements
               WHERE lower(title) = lower($1)
                 AND ($2::timestamptz IS NULL OR published_at = $2)"#,
        )
        .bind(&snapshot.title)
        .bind(snapshot.published_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: AnnouncementSnapshot = serde_json::from_value(record.clone())?;
        let author_id =
            resolve_optional_author(&self.pool, snapshot.author.as_deref(), "author").await?;

        sqlx::query(
            r#"INSERT INTO announcements (title, body, published_at, author_id, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&snapshot.title)
        .bind(&snapshot.body)
        .bind(snapshot.published_at.unwrap_or_else(Utc::now))
        .bind(author_id)
        .bind(snapshot.created_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: AnnouncementSnapshot = serde_json::from_value(record.clone())?;

        sqlx::query("UPDATE announcements SET body = $1 WHERE id = $2")
            .bind(&snapshot.body)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// ===== Advisories =====

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdvisorySnapshot {
    title: String,
    body: String,
    #[serde(default = "default_severity")]
    severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

fn default_severity() -> String {
    "info".to_string()
}

pub struct AdvisoryRepository {
    pool: PgPool,
}

impl AdvisoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl EntityRepository for AdvisoryRepository {
    fn kind(&self) -> EntityKind {
        EntityKind::Advisories
    }

    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        let rows: Vec<(String, String, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
            r#"SELECT a.title, a.body, a.severity, u.email, a.created_at
               FROM advisories a
               LEFT JOIN users u ON u.id = a.author_id
               WHERE ($1::timestamptz IS NULL OR a.created_at >= $1)
                 AND ($2::timestamptz IS NULL OR a.created_at <= $2)
                 AND ($3::int4 IS NULL OR a.author_id = $3)
               ORDER BY a.created_at ASC, a.id ASC
               LIMIT $4"#,
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.author_id)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(title, body, severity, author, created_at)| {
                serde_json::to_value(AdvisorySnapshot {
                    title,
                    body,
                    severity,
                    author,
                    created_at: Some(created_at),
                })
            })
            .collect::<Result<_, _>>()
            .map_err(BackupError::from)
    }

    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM advisories
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
        let snapshot: AdvisorySnapshot = serde_json::from_value(record.clone())?;

        // lower(NULL) stays NULL, so authorless advisories match each other.
        let id = sqlx::query_scalar(
            r#"SELECT a.id FROM advisories a
               LEFT JOIN users u ON u.id = a.author_id
               WHERE lower(a.title) = lower($1)
                 AND lower(u.email) IS NOT DISTINCT FROM lower($2)"#,
        )
        .bind(&snapshot.title)
        .bind(&snapshot.author)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: AdvisorySnapshot = serde_json::from_value(record.clone())?;
        let author_id =
            resolve_optional_author(&self.pool, snapshot.author.as_deref(), "author").await?;

        sqlx::query(
            r#"INSERT INTO advisories (title, body, severity, author_id, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&snapshot.title)
        .bind(&snapshot.body)
        .bind(&snapshot.severity)
        .bind(author_id)
        .bind(snapshot.created_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: AdvisorySnapshot = serde_json::from_value(record.clone())?;

        sqlx::query("UPDATE advisories SET body = $1, severity = $2 WHERE id = $3")
            .bind(&snapshot.body)
            .bind(&snapshot.severity)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// ===== Blogs =====

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlogSnapshot {
    title: String,
    slug: String,
    body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

pub struct BlogRepository {
    pool: PgPool,
}

impl BlogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl EntityRepository for BlogRepository {
    fn kind(&self) -> EntityKind {
        EntityKind::Blogs
    }

    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        let rows: Vec<(String, String, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
            r#"SELECT b.title, b.slug, b.body, u.email, b.created_at
               FROM blogs b
               LEFT JOIN users u ON u.id = b.author_id
               WHERE ($1::timestamptz IS NULL OR b.created_at >= $1)
                 AND ($2::timestamptz IS NULL OR b.created_at <= $2)
                 AND ($3::int4 IS NULL OR b.author_id = $3)
               ORDER BY b.created_at ASC, b.id ASC
               LIMIT $4"#,
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.author_id)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(title, slug, body, author, created_at)| {
                serde_json::to_value(BlogSnapshot {
                    title,
                    slug,
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
            r#"SELECT COUNT(*) FROM blogs
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
        let snapshot: BlogSnapshot = serde_json::from_value(record.clone())?;
        let id = sqlx::query_scalar("SELECT id FROM blogs WHERE slug = $1")
            .bind(&snapshot.slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: BlogSnapshot = serde_json::from_value(record.clone())?;

        if snapshot.slug.trim().is_empty() {
            return Err(RecordError::InvalidSnapshot(
                "blog slug must not be empty".to_string(),
            ));
        }

        let author_id =
            resolve_optional_author(&self.pool, snapshot.author.as_deref(), "author").await?;

        sqlx::query(
            r#"INSERT INTO blogs (title, slug, body, author_id, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&snapshot.title)
        .bind(&snapshot.slug)
        .bind(&snapshot.body)
        .bind(author_id)
        .bind(snapshot.created_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: BlogSnapshot = serde_json::from_value(record.clone())?;

        sqlx::query("UPDATE blogs SET title = $1, body = $2 WHERE id = $3")
            .bind(&snapshot.title)
            .bind(&snapshot.body)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

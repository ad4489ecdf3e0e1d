use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::backup::{BackupError, EntityKind, RecordError, SelectionFilter};
use crate::store::{EntityRepository, resolve_required_author};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobOfferSnapshot {
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salary_range: Option<String>,
    /// Offering company, referenced by name.
    company: String,
    /// Posting member, referenced by email.
    author: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

pub struct JobOfferRepository {
    pool: PgPool,
}

impl JobOfferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn resolve_company(&self, name: &str) -> Result<i32, RecordError> {
        let id: Option<i32> =
            sqlx::query_scalar("SELECT id FROM companies WHERE lower(name) = lower($1)")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        id.ok_or_else(|| RecordError::UnresolvedReference(format!("company '{name}' not found")))
    }
}

#[rocket::async_trait]
impl EntityRepository for JobOfferRepository {
    fn kind(&self) -> EntityKind {
        EntityKind::JobOffers
    }

    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        let rows: Vec<(
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            String,
            DateTime<Utc>,
        )> = sqlx::query_as(
            r#"SELECT j.title, j.description, j.location, j.salary_range,
                      c.name, u.email, j.created_at
               FROM job_offers j
               JOIN companies c ON c.id = j.company_id
               JOIN users u ON u.id = j.author_id
               WHERE ($1::timestamptz IS NULL OR j.created_at >= $1)
                 AND ($2::timestamptz IS NULL OR j.created_at <= $2)
                 AND ($3::int4 IS NULL OR j.author_id = $3)
               ORDER BY j.created_at ASC, j.id ASC
               LIMIT $4"#,
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.author_id)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(title, description, location, salary_range, company, author, created_at)| {
                    serde_json::to_value(JobOfferSnapshot {
                        title,
                        description,
                        location,
                        salary_range,
                        company,
                        author,
                        created_at: Some(created_at),
                    })
                },
            )
            .collect::<Result<_, _>>()
            .map_err(BackupError::from)
    }

    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM job_offers
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
        let snapshot: JobOfferSnapshot = serde_json::from_value(record.clone())?;

        let id = sqlx::query_scalar(
            r#"SELECT j.id FROM job_offers j
               JOIN companies c ON c.id = j.company_id
               JOIN users u ON u.id = j.author_id
               WHERE lower(j.title) = lower($1)
                 AND lower(c.name) = lower($2)
                 AND lower(u.email) = lower($3)"#,
        )
        .bind(&snapshot.title)
        .bind(&snapshot.company)
        .bind(&snapshot.author)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: JobOfferSnapshot = serde_json::from_value(record.clone())?;
        let company_id = self.resolve_company(&snapshot.company).await?;
        let author_id = resolve_required_author(&self.pool, &snapshot.author, "author").await?;

        sqlx::query(
            r#"INSERT INTO job_offers
               (title, description, location, salary_range, company_id, author_id, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(&snapshot.title)
        .bind(&snapshot.description)
        .bind(&snapshot.location)
        .bind(&snapshot.salary_range)
        .bind(company_id)
        .bind(author_id)
        .bind(snapshot.created_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: JobOfferSnapshot = serde_json::from_value(record.clone())?;

        sqlx::query(
            r#"UPDATE job_offers SET description = $1, location = $2, salary_range = $3
               WHERE id = $4"#,
        )
        .bind(&snapshot.description)
        .bind(&snapshot.location)
        .bind(&snapshot.salary_range)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::backup::{BackupError, EntityKind, RecordError, SelectionFilter};
use crate::store::EntityRepository;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailTemplateSnapshot {
    key: String,
    subject: String,
    body_html: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

pub struct EmailTemplateRepository {
    pool: PgPool,
}

impl EmailTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl EntityRepository for EmailTemplateRepository {
    fn kind(&self) -> EntityKind {
        EntityKind::EmailTemplates
    }

    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        let rows: Vec<(String, String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"SELECT key, subject, body_html, created_at
               FROM email_templates
               WHERE ($1::timestamptz IS NULL OR created_at >= $1)
                 AND ($2::timestamptz IS NULL OR created_at <= $2)
               ORDER BY key ASC
               LIMIT $3"#,
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(key, subject, body_html, created_at)| {
                serde_json::to_value(EmailTemplateSnapshot {
                    key,
                    subject,
                    body_html,
                    created_at: Some(created_at),
                })
            })
            .collect::<Result<_, _>>()
            .map_err(BackupError::from)
    }

    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM email_templates
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
        let snapshot: EmailTemplateSnapshot = serde_json::from_value(record.clone())?;
        let id = sqlx::query_scalar("SELECT id FROM email_templates WHERE key = $1")
            .bind(&snapshot.key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: EmailTemplateSnapshot = serde_json::from_value(record.clone())?;

        sqlx::query(
            r#"INSERT INTO email_templates (key, subject, body_html, created_at)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(&snapshot.key)
        .bind(&snapshot.subject)
        .bind(&snapshot.body_html)
        .bind(snapshot.created_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: EmailTemplateSnapshot = serde_json::from_value(record.clone())?;

        sqlx::query("UPDATE email_templates SET subject = $1, body_html = $2 WHERE id = $3")
            .bind(&snapshot.subject)
            .bind(&snapshot.body_html)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::backup::{BackupError, EntityKind, RecordError, SelectionFilter};
use crate::store::EntityRepository;

/// Importable fields of one member account. Credentials, token versions and
/// moderation flags are not portable and never leave the instance.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSnapshot {
    username: String,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    headline: Option<String>,
    #[serde(default = "default_role")]
    role: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

fn default_role() -> String {
    "user".to_string()
}

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl EntityRepository for UserRepository {
    fn kind(&self) -> EntityKind {
        EntityKind::Users
    }

    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        let rows: Vec<(
            String,
            String,
            Option<String>,
            Option<String>,
            String,
            DateTime<Utc>,
        )> = sqlx::query_as(
            r#"SELECT username, email, display_name, headline, role, created_at
               FROM users
               WHERE ($1::timestamptz IS NULL OR created_at >= $1)
                 AND ($2::timestamptz IS NULL OR created_at <= $2)
               ORDER BY created_at ASC, id ASC
               LIMIT $3"#,
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(username, email, display_name, headline, role, created_at)| {
                    serde_json::to_value(UserSnapshot {
                        username,
                        email,
                        display_name,
                        headline,
                        role,
                        created_at: Some(created_at),
                    })
                },
            )
            .collect::<Result<_, _>>()
            .map_err(BackupError::from)
    }

    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM users
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
        let snapshot: UserSnapshot = serde_json::from_value(record.clone())?;
        let id = sqlx::query_scalar("SELECT id FROM users WHERE lower(email) = lower($1)")
            .bind(&snapshot.email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: UserSnapshot = serde_json::from_value(record.clone())?;

        if !snapshot.email.contains('@') {
            return Err(RecordError::InvalidSnapshot(format!(
                "email '{}' is not an address",
                snapshot.email
            )));
        }
        if snapshot.username.trim().is_empty() {
            return Err(RecordError::InvalidSnapshot(
                "username must not be empty".to_string(),
            ));
        }

        sqlx::query(
            r#"INSERT INTO users (username, email, display_name, headline, role, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&snapshot.username)
        .bind(&snapshot.email)
        .bind(&snapshot.display_name)
        .bind(&snapshot.headline)
        .bind(&snapshot.role)
        .bind(snapshot.created_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        let snapshot: UserSnapshot = serde_json::from_value(record.clone())?;

        sqlx::query(
            r#"UPDATE users SET display_name = $1, headline = $2, role = $3
               WHERE id = $4"#,
        )
        .bind(&snapshot.display_name)
        .bind(&snapshot.headline)
        .bind(&snapshot.role)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

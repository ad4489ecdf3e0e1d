use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

/// Standard envelope wrapping every successful API payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// A member account row as stored. The auth guard re-checks this row on
/// every request; backup snapshots carry only its portable subset.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub headline: Option<String>,
    pub role: String,
    pub disabled: bool,
    pub token_version: i32,
    pub created_at: DateTime<Utc>,
}

/// A category row. Self-referencing via `parent_id`; uniqueness is
/// (name case-insensitively, type, parent).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub category_type: String,
    pub color: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

//! Aggregate platform statistics for the admin console.

use rocket::State;
use rocket::get;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::auth::RequireAdmin;
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::store::categories::CategoryRepository;

/// Shape of the category hierarchy.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTreeStats {
    pub roots: i64,
    pub max_depth: i64,
    /// Size of the largest root subtree, the root itself included.
    pub largest_subtree: i64,
}

/// Aggregated statistics about the platform collections.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatusResponse {
    pub total_users: i64,
    pub total_categories: i64,
    pub total_companies: i64,
    pub total_groups: i64,
    pub total_posts: i64,
    pub total_job_offers: i64,
    pub total_announcements: i64,
    pub total_advisories: i64,
    pub total_blogs: i64,
    pub total_email_templates: i64,
    pub category_tree: CategoryTreeStats,
}

async fn count_table(pool: &sqlx::PgPool, query: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_as::<_, (i64,)>(query)
        .fetch_one(pool)
        .await
        .map(|row| row.0)
}

/// Return aggregate statistics about the platform collections.
#[openapi(tag = "Admin")]
#[get("/admin/platform/status")]
pub async fn platform_status(
    _admin: RequireAdmin,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<ApiResponse<PlatformStatusResponse>>, ApiError> {
    let pool = pool.inner();

    let (
        total_users,
        total_categories,
        total_companies,
        total_groups,
        total_posts,
        total_job_offers,
        total_announcements,
        total_advisories,
        total_blogs,
        total_email_templates,
    ) = tokio::try_join!(
        count_table(pool, "SELECT COUNT(*) FROM users"),
        count_table(pool, "SELECT COUNT(*) FROM categories"),
        count_table(pool, "SELECT COUNT(*) FROM companies"),
        count_table(pool, "SELECT COUNT(*) FROM groups"),
        count_table(pool, "SELECT COUNT(*) FROM posts"),
        count_table(pool, "SELECT COUNT(*) FROM job_offers"),
        count_table(pool, "SELECT COUNT(*) FROM announcements"),
        count_table(pool, "SELECT COUNT(*) FROM advisories"),
        count_table(pool, "SELECT COUNT(*) FROM blogs"),
        count_table(pool, "SELECT COUNT(*) FROM email_templates"),
    )?;

    let arena = CategoryRepository::new(pool.clone())
        .arena()
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to load category tree: {e}")))?;

    let roots = arena.roots();
    let largest_subtree = roots
        .iter()
        .map(|&root| arena.descendants(root).len() as i64 + 1)
        .max()
        .unwrap_or(0);

    let category_tree = CategoryTreeStats {
        roots: roots.len() as i64,
        max_depth: arena.max_depth() as i64,
        largest_subtree,
    };

    Ok(Json(ApiResponse::ok(PlatformStatusResponse {
        total_users,
        total_categories,
        total_companies,
        total_groups,
        total_posts,
        total_job_offers,
        total_announcements,
        total_advisories,
        total_blogs,
        total_email_templates,
        category_tree,
    })))
}

//! Admin endpoints for the granular backup & restore engine.

use std::sync::Arc;

use rocket::State;
use rocket::serde::json::Json;
use rocket::{get, post};
use rocket_db_pools::sqlx;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::auth::RequireAdmin;
use crate::backup::validate::validate_payload;
use crate::backup::{
    BackupDocument, Collector, ImportOptions, ImportOrchestrator, ImportResult, PreviewReport,
};
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::routes::params::BackupSelectionParams;
use crate::store::BackupRegistry;

/// Request body for the import endpoint: the document to apply plus the
/// per-kind import switches.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    /// A previously exported backup document. Validated structurally before
    /// anything is written.
    #[serde(default)]
    pub backup_data: Option<JsonValue>,
    #[serde(default)]
    pub options: ImportOptions,
}

/// Per-kind outcome counters for a completed import.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ImportResponse {
    pub results: ImportResult,
}

/// Count how many records the given selection would export, without
/// materializing any of them.
#[openapi(tag = "Backup")]
#[get("/admin/backup/preview?<params..>")]
pub async fn preview_backup(
    _admin: RequireAdmin,
    params: BackupSelectionParams,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<ApiResponse<PreviewReport>>, ApiError> {
    let registry = BackupRegistry::for_pool(pool.inner());
    let report = Collector::new(&registry)
        .preview(&params.into_policy())
        .await;

    Ok(Json(ApiResponse::ok(report)))
}

/// Export the selected collections as a single portable document. The
/// response body is the downloadable backup itself.
#[openapi(tag = "Backup")]
#[post("/admin/backup/export", data = "<policy>")]
pub async fn export_backup(
    admin: RequireAdmin,
    policy: Json<crate::backup::SelectionPolicy>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<ApiResponse<BackupDocument>>, ApiError> {
    let registry = BackupRegistry::for_pool(pool.inner());
    let document = Collector::new(&registry).export(&policy).await;

    log::info!(
        "{} exported {} collections ({} records)",
        admin.0.email,
        document.data.len(),
        document.statistics.values().sum::<i64>()
    );

    Ok(Json(ApiResponse::ok(document)))
}

/// Import a backup document. Structural problems reject the whole request
/// with 400 before any write; problems local to one record are tallied into
/// that kind's `errors` counter while the rest of the import proceeds.
#[openapi(tag = "Backup")]
#[post("/admin/backup/import", data = "<request>")]
pub async fn import_backup(
    admin: RequireAdmin,
    request: Json<ImportRequest>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<ApiResponse<ImportResponse>>, ApiError> {
    let request = request.into_inner();

    let document = validate_payload(request.backup_data.as_ref())
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    log::info!("{} started an import", admin.0.email);

    let registry = Arc::new(BackupRegistry::for_pool(pool.inner()));
    let results = ImportOrchestrator::new(registry)
        .run(&document, &request.options)
        .await;

    Ok(Json(ApiResponse::ok(ImportResponse { results })))
}

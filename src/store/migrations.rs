//! Database migration management.
//!
//! Validates and applies SQLx migrations before the API starts serving
//! requests, and provides a destructive reset for development databases.

use sqlx::{PgPool, migrate::Migrator};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations.
///
/// Idempotent: migrations that have already been applied are skipped, and
/// checksums of applied migrations are verified before serving traffic.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    log::info!("checking database migration state");

    MIGRATOR.run(pool).await?;

    log::info!("database migrations up to date");
    Ok(())
}

/// Reset the database by dropping and recreating the public schema.
///
/// **WARNING**: drops ALL data. Development and test use only.
pub async fn reset_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    log::info!("resetting database schema");

    sqlx::query("DROP SCHEMA IF EXISTS public CASCADE")
        .execute(pool)
        .await?;

    sqlx::query("CREATE SCHEMA public").execute(pool).await?;

    sqlx::query("GRANT ALL ON SCHEMA public TO postgres")
        .execute(pool)
        .await?;

    sqlx::query("GRANT ALL ON SCHEMA public TO public")
        .execute(pool)
        .await?;

    log::info!("schema dropped, running migrations");

    MIGRATOR.run(pool).await?;

    log::info!("database schema created via migrations");
    Ok(())
}

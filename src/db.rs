use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("agora_db")]
pub struct AgoraDb(sqlx::PgPool);

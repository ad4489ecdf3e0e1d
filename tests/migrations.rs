use agora_api::test_support::TestDatabase;

#[tokio::test]
async fn migrations_create_the_platform_schema() {
    let test_db = match TestDatabase::new().await {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping migration test: could not provision postgres container: {err:?}");
            return;
        }
    };

    let pool = test_db.pool_clone();

    for table in [
        "users",
        "categories",
        "companies",
        "groups",
        "posts",
        "job_offers",
        "announcements",
        "advisories",
        "blogs",
        "email_templates",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name = $1",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .expect("lookup succeeded");

        assert_eq!(count, 1, "table '{table}' should exist after migrations");
    }

    // Re-running is a no-op.
    agora_api::store::run_migrations(&pool)
        .await
        .expect("migrations are idempotent");

    // A development reset rebuilds the schema from scratch.
    sqlx::query("INSERT INTO users (username, email, role) VALUES ('ada', 'ada@example.com', 'user')")
        .execute(&pool)
        .await
        .expect("seed user");

    agora_api::store::reset_database(&pool)
        .await
        .expect("reset database");

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .expect("count users");
    assert_eq!(users, 0, "reset should drop all rows");

    test_db.close().await.expect("failed to drop test database");
}

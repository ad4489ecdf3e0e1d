//! End-to-end export/import behavior against a real Postgres instance.

use agora_api::backup::{EntityKind, KindCounters};
use agora_api::models::ApiResponse;
use agora_api::routes::backup::{ImportResponse, export_backup, import_backup, preview_backup};
use agora_api::test_support::{TestDatabase, TestFixtures, TestRocketBuilder, test_auth_state};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use rocket::routes;
use rocket::serde::json::json;

struct Harness {
    test_db: TestDatabase,
    client: Client,
    token: String,
}

async fn harness() -> Option<Harness> {
    let test_db = match TestDatabase::new().await {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping backup test: could not provision postgres container: {err:?}");
            return None;
        }
    };

    let pool = test_db.pool_clone();
    let auth_state = test_auth_state();
    let fixtures = TestFixtures::new(&pool);

    let admin_id = fixtures
        .insert_user("admin", "admin@example.com", "admin")
        .await
        .expect("insert admin");
    let token = auth_state
        .jwt_service
        .issue_access_token(admin_id, "admin@example.com", "admin", 0)
        .expect("issue token");

    let client = TestRocketBuilder::new()
        .manage_pg_pool(pool)
        .manage_auth_state(auth_state)
        .mount_api_routes(routes![preview_backup, export_backup, import_backup])
        .async_client()
        .await;

    Some(Harness {
        test_db,
        client,
        token: token.token,
    })
}

impl Harness {
    fn bearer(&self) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", self.token))
    }

    async fn import(
        &self,
        backup_data: rocket::serde::json::Value,
        options: rocket::serde::json::Value,
    ) -> ImportResponse {
        let response = self
            .client
            .post("/api/v1/admin/backup/import")
            .header(ContentType::JSON)
            .header(self.bearer())
            .body(json!({ "backupData": backup_data, "options": options }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let payload: ApiResponse<ImportResponse> =
            response.into_json().await.expect("import response");
        assert!(payload.success);
        payload.data
    }
}

#[tokio::test]
async fn preview_export_and_reimport_agree() {
    let Some(harness) = harness().await else {
        return;
    };
    let pool = harness.test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);

    let author_id = fixtures
        .insert_user("ada", "ada@example.com", "user")
        .await
        .expect("insert author");
    let root = fixtures
        .insert_category("Tecnologia", "company", None)
        .await
        .expect("insert root category");
    let software = fixtures
        .insert_category("Software", "company", Some(root))
        .await
        .expect("insert child category");
    fixtures
        .insert_category("Backend", "company", Some(software))
        .await
        .expect("insert grandchild category");
    fixtures
        .insert_company("Initech", Some(author_id))
        .await
        .expect("insert company");
    fixtures
        .insert_post(author_id, "Hello Agora", "first post")
        .await
        .expect("insert post");

    // Preview over the query string.
    let response = harness
        .client
        .get("/api/v1/admin/backup/preview?kinds=users&kinds=categories&kinds=companies&kinds=posts")
        .header(harness.bearer())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let preview: ApiResponse<agora_api::backup::PreviewReport> =
        response.into_json().await.expect("preview response");
    assert_eq!(preview.data.statistics[&EntityKind::Users], 2);
    assert_eq!(preview.data.statistics[&EntityKind::Categories], 3);
    assert_eq!(preview.data.statistics[&EntityKind::Companies], 1);
    assert_eq!(preview.data.statistics[&EntityKind::Posts], 1);
    assert_eq!(preview.data.total_records, 7);

    // Export the same selection.
    let response = harness
        .client
        .post("/api/v1/admin/backup/export")
        .header(ContentType::JSON)
        .header(harness.bearer())
        .body(
            json!({
                "entities": {
                    "users": true,
                    "categories": true,
                    "companies": true,
                    "posts": true
                }
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let export: ApiResponse<agora_api::backup::BackupDocument> =
        response.into_json().await.expect("export response");
    let document = export.data;

    // Statistics always mirror the data lengths, and match the preview.
    for (kind, records) in &document.data {
        assert_eq!(document.statistics[kind], records.len() as i64);
        assert_eq!(preview.data.statistics[kind], records.len() as i64);
    }

    // Snapshots reference parents by name chain, not by id.
    let categories = document.records(EntityKind::Categories).expect("categories");
    let backend = categories
        .iter()
        .find(|snapshot| snapshot["name"] == "Backend")
        .expect("backend snapshot");
    assert_eq!(backend["parent"], json!(["Tecnologia", "Software"]));

    // Re-importing into the same store changes nothing.
    let document_value = serde_json::to_value(&document).expect("document value");
    let options = json!({
        "entities": { "users": true, "categories": true, "companies": true, "posts": true },
        "replaceExisting": false
    });

    for _ in 0..2 {
        let result = harness.import(document_value.clone(), options.clone()).await;
        for kind in [
            EntityKind::Users,
            EntityKind::Categories,
            EntityKind::Companies,
            EntityKind::Posts,
        ] {
            let counters = result.results[&kind];
            assert_eq!(counters.created, 0, "{kind} must not be re-created");
            assert_eq!(counters.updated, 0, "{kind} must not be updated");
            assert_eq!(counters.errors, 0, "{kind} must not error");
            assert!(counters.skipped > 0);
        }
    }

    let total_categories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(&pool)
        .await
        .expect("count categories");
    assert_eq!(total_categories, 3);

    drop(harness.client);
    harness
        .test_db
        .close()
        .await
        .expect("failed to drop test database");
}

#[tokio::test]
async fn import_creates_updates_and_isolates_errors() {
    let Some(harness) = harness().await else {
        return;
    };
    let pool = harness.test_db.pool_clone();

    // Fresh create into an empty store.
    let result = harness
        .import(
            json!({ "data": { "categories": [
                { "name": "Tecnologia", "type": "company", "color": "#0044aa" }
            ] } }),
            json!({ "entities": { "categories": true } }),
        )
        .await;
    assert_eq!(
        result.results[&EntityKind::Categories],
        KindCounters {
            created: 1,
            ..Default::default()
        }
    );

    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM categories")
        .fetch_all(&pool)
        .await
        .expect("category names");
    assert_eq!(names, vec!["Tecnologia".to_string()]);

    // Same document again: skipped, not duplicated.
    let result = harness
        .import(
            json!({ "data": { "categories": [
                { "name": "Tecnologia", "type": "company", "color": "#0044aa" }
            ] } }),
            json!({ "entities": { "categories": true } }),
        )
        .await;
    assert_eq!(
        result.results[&EntityKind::Categories],
        KindCounters {
            skipped: 1,
            ..Default::default()
        }
    );

    // Changed field with replaceExisting updates in place.
    let result = harness
        .import(
            json!({ "data": { "categories": [
                { "name": "tecnologia", "type": "company", "color": "#ff8800" }
            ] } }),
            json!({ "entities": { "categories": true }, "replaceExisting": true }),
        )
        .await;
    assert_eq!(
        result.results[&EntityKind::Categories],
        KindCounters {
            updated: 1,
            ..Default::default()
        }
    );

    let color: Option<String> =
        sqlx::query_scalar("SELECT color FROM categories WHERE lower(name) = 'tecnologia'")
            .fetch_one(&pool)
            .await
            .expect("category color");
    assert_eq!(color.as_deref(), Some("#ff8800"));

    // A child whose parent is in the same batch imports in one pass; an
    // orphan is counted as an error without affecting its siblings.
    let result = harness
        .import(
            json!({ "data": { "categories": [
                { "name": "Backend", "type": "company", "parent": ["Tecnologia", "Software"] },
                { "name": "Software", "type": "company", "parent": ["Tecnologia"] },
                { "name": "Orphan", "type": "company", "parent": ["Nowhere"] }
            ] } }),
            json!({ "entities": { "categories": true } }),
        )
        .await;
    assert_eq!(
        result.results[&EntityKind::Categories],
        KindCounters {
            created: 2,
            errors: 1,
            ..Default::default()
        }
    );

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(&pool)
        .await
        .expect("count categories");
    assert_eq!(total, 3);

    // Kinds absent from the options are untouched even when present in the
    // document.
    let result = harness
        .import(
            json!({ "data": {
                "categories": [ { "name": "Marketing", "type": "company" } ],
                "emailTemplates": [ { "key": "welcome", "subject": "Hi", "bodyHtml": "<p>Hi</p>" } ]
            } }),
            json!({ "entities": { "emailTemplates": true } }),
        )
        .await;
    assert!(!result.results.contains_key(&EntityKind::Categories));
    assert_eq!(
        result.results[&EntityKind::EmailTemplates],
        KindCounters {
            created: 1,
            ..Default::default()
        }
    );

    let marketing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE name = 'Marketing'")
            .fetch_one(&pool)
            .await
            .expect("count marketing");
    assert_eq!(marketing, 0);

    drop(harness.client);
    harness
        .test_db
        .close()
        .await
        .expect("failed to drop test database");
}

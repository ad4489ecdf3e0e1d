#[macro_use]
extern crate rocket;

pub mod auth;
pub mod backup;
pub mod db;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod store;

use crate::auth::{AuthConfig, AuthState, JwtService};
use crate::db::AgoraDb;
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::Once;

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(AgoraDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match AgoraDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match store::run_migrations(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // Fairing to clone and manage the database pool for guards and the
        // backup registry
        .attach(AdHoc::try_on_ignite("Manage DB Pool", |rocket| async move {
            match AgoraDb::fetch(&rocket) {
                Some(db) => {
                    let pool = (**db).clone();
                    Ok(rocket.manage(pool))
                }
                None => Err(rocket),
            }
        }))
        // Token validation state for the admin guards
        .attach(AdHoc::try_on_ignite(
            "Auth Configuration",
            |rocket| async move {
                let config = match AuthConfig::from_env() {
                    Ok(config) => config,
                    Err(err) => {
                        log::error!("auth configuration failed: {}", err);
                        return Err(rocket);
                    }
                };
                match JwtService::from_config(&config) {
                    Ok(service) => Ok(rocket.manage(AuthState::new(config, service))),
                    Err(err) => {
                        log::error!("jwt service initialization failed: {}", err);
                        Err(rocket)
                    }
                }
            },
        ))
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Admin console routes
                routes::status::platform_status,
                // Backup & restore routes
                routes::backup::preview_backup,
                routes::backup::export_backup,
                routes::backup::import_backup,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Agora API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};

    use crate::auth::{AuthConfig, AuthState, JwtService};

    pub use database::{TestDatabase, TestDatabaseError};

    pub const TEST_JWT_SECRET: &str = "test-admin-secret";

    /// Token validation state with a fixed secret for route tests.
    pub fn test_auth_state() -> AuthState {
        let config = AuthConfig {
            issuer: "https://agora.test".into(),
            audience: "agora-api".into(),
            access_token_ttl_secs: 900,
            jwt_secret: TEST_JWT_SECRET.into(),
            jwt_kid: Some("test-kid".into()),
        };
        let jwt_service = JwtService::from_config(&config).expect("jwt service");
        AuthState::new(config, jwt_service)
    }

    /// Convenience helpers for seeding platform rows in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        /// Create a fixture helper bound to the provided pool.
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert a user row, returning the new user id.
        pub async fn insert_user(
            &self,
            username: &str,
            email: &str,
            role: &str,
        ) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO users (username, email, role) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(username)
            .bind(email)
            .bind(role)
            .fetch_one(self.pool)
            .await
        }

        /// Insert a category row, optionally under a parent.
        pub async fn insert_category(
            &self,
            name: &str,
            category_type: &str,
            parent_id: Option<i32>,
        ) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar(
                r#"INSERT INTO categories (name, category_type, parent_id)
                   VALUES ($1, $2, $3) RETURNING id"#,
            )
            .bind(name)
            .bind(category_type)
            .bind(parent_id)
            .fetch_one(self.pool)
            .await
        }

        /// Insert a company row.
        pub async fn insert_company(
            &self,
            name: &str,
            owner_id: Option<i32>,
        ) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO companies (name, owner_id) VALUES ($1, $2) RETURNING id",
            )
            .bind(name)
            .bind(owner_id)
            .fetch_one(self.pool)
            .await
        }

        /// Insert a post row for assertions in tests.
        pub async fn insert_post(
            &self,
            author_id: i32,
            title: &str,
            body: &str,
        ) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO posts (author_id, title, body) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(author_id)
            .bind(title)
            .bind(body)
            .fetch_one(self.pool)
            .await
        }
    }

    pub mod database {
        use rocket_db_pools::sqlx::postgres::PgPoolOptions;
        use rocket_db_pools::sqlx::{self, PgPool};
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database factory for integration tests: one disposable
        /// Postgres container per test, migrated and ready.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Provision a fresh database by launching a disposable Postgres
            /// container. Callers treat any error as "environment has no
            /// Docker" and skip.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&url)
                    .await?;

                crate::store::run_migrations(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    container: Some(container),
                })
            }

            /// Cloneable connection pool for use in tests and Rocket state.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Convenience method returning a clone of the pooled connection
            /// handle.
            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and tear the container down.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }
                if let Some(container) = self.container.take() {
                    drop(container);
                }
                Ok(())
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration
    /// tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        auth_state: Option<AuthState>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging
        /// disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pg_pool: None,
                auth_state: None,
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Manage a `PgPool` instance for tests that exercise database-backed
        /// routes.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Manage an `AuthState` for tests that exercise guarded routes.
        pub fn manage_auth_state(mut self, auth_state: AuthState) -> Self {
            self.auth_state = Some(auth_state);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            if let Some(auth_state) = self.auth_state {
                rocket = rocket.manage(auth_state);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}

use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use agora_api::auth::{AuthConfig, JwtService};

#[derive(Parser, Debug)]
#[command(
    name = "create_admin",
    about = "Create an Agora administrator account and mint an access token"
)]
struct Args {
    /// Email address for the account (case insensitive).
    #[arg(long)]
    email: String,

    /// Unique handle for the account.
    #[arg(long)]
    username: String,

    /// Optional display name to associate with the account.
    #[arg(long)]
    display_name: Option<String>,

    /// Skip token minting and only create the database row.
    #[arg(long, default_value_t = false)]
    no_token: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = args.email.trim().to_lowercase();
    let username = args.username.trim().to_string();

    if !email.contains('@') {
        writeln!(io::stderr(), "error: email must contain '@'")?;
        std::process::exit(1);
    }
    if username.is_empty() {
        writeln!(io::stderr(), "error: username must not be empty")?;
        std::process::exit(1);
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE lower(email) = lower($1) OR lower(username) = lower($2)",
    )
    .bind(&email)
    .bind(&username)
    .fetch_one(&pool)
    .await?;

    if existing > 0 {
        writeln!(
            io::stderr(),
            "error: a user with email '{email}' or username '{username}' already exists."
        )?;
        std::process::exit(1);
    }

    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (username, email, display_name, role) VALUES ($1, $2, $3, 'admin') RETURNING id",
    )
    .bind(&username)
    .bind(&email)
    .bind(args.display_name.as_ref())
    .fetch_one(&pool)
    .await?;

    println!("Created admin user '{email}' with id {user_id}");

    if !args.no_token {
        let config = AuthConfig::from_env()?;
        let jwt_service = JwtService::from_config(&config)?;
        let token = jwt_service.issue_access_token(user_id, &email, "admin", 0)?;

        println!("Access token (valid until {}):", token.expires_at);
        println!("{}", token.token);
    }

    Ok(())
}

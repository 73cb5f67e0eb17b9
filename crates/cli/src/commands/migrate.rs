//! Database migration command.
//!
//! Runs the commerce migrations (`crates/commerce/migrations/`) against the
//! configured database. Servers never migrate on startup; this command is
//! the only migration path.
//!
//! # Environment Variables
//!
//! - `COMMERCE_DATABASE_URL` - `PostgreSQL` connection string
//!   (falls back to `DATABASE_URL`)

use secrecy::ExposeSecret;
use sqlx::PgPool;

/// Migration failure.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    MissingEnvVar(#[from] super::MissingEnvVar),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run commerce database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration
/// fails to apply.
pub async fn run() -> Result<(), MigrationError> {
    let database_url = super::database_url()?;

    tracing::info!("Connecting to commerce database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running commerce migrations...");
    sqlx::migrate!("../commerce/migrations").run(&pool).await?;

    tracing::info!("Commerce migrations complete!");
    Ok(())
}

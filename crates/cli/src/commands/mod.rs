//! CLI subcommand implementations.

pub mod migrate;
pub mod pending;
pub mod reconcile;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] threadline_storefront::db::RepositoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] threadline_storefront::config::ConfigError),

    #[error("No pending order with reference {0}")]
    NotFound(uuid::Uuid),
}

/// Read the storefront database URL from the environment.
///
/// `STOREFRONT_DATABASE_URL` wins over `DATABASE_URL`.
fn database_url() -> Result<SecretString, CliError> {
    dotenvy::dotenv().ok();
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// Connect to the storefront database.
async fn connect() -> Result<PgPool, CliError> {
    let url = database_url()?;
    tracing::info!("Connecting to storefront database...");
    Ok(threadline_storefront::db::create_pool(&url).await?)
}

//! CLI command implementations.

pub mod migrate;
pub mod orders;

use secrecy::SecretString;

/// Database URL from `COMMERCE_DATABASE_URL`, falling back to `DATABASE_URL`.
pub(crate) fn database_url() -> Result<SecretString, MissingEnvVar> {
    dotenvy::dotenv().ok();
    std::env::var("COMMERCE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingEnvVar("COMMERCE_DATABASE_URL"))
}

/// Required environment variable was not set.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVar(&'static str);

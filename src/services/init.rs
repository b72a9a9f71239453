//! Initialization helpers for the application:
//! - database connection + migrations
//! - guest account seeding

use std::{path::Path, sync::Arc, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use anyhow::Result;

use crate::config::Config;
use crate::services::provisioning::AccountProvisioner;

/// Redact potentially sensitive information from a database URL before logging.
///
/// Falls back to removing everything before '@' or returning "(redacted)".
pub fn redact_db_url(db_url: &str) -> String {
    if let Ok(url) = url::Url::parse(db_url) {
        let host = url.host_str().unwrap_or("");
        let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
        format!("{}://{}{}{}", url.scheme(), host, port, url.path())
    } else if let Some(at) = db_url.find('@') {
        format!("(redacted){}", &db_url[at + 1..])
    } else {
        "(redacted)".to_string()
    }
}

/// Open the SQLite pool and run migrations.
///
/// Creates the parent directory of the database file when needed. Foreign keys
/// are switched on for every pooled connection. WAL lets readers proceed next
/// to the single writer, and the busy timeout matches the begin budget for
/// lock contention from outside this process.
pub async fn init_db(config: &Config) -> Result<sqlx::SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database: {}", redact_db_url(db_url));

    let db_path = db_url.strip_prefix("sqlite://").unwrap_or(db_url);
    let db_file_path = Path::new(db_path);

    if let Some(parent) = db_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let connect_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(config.database.begin_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Make sure the guest account exists before the server takes traffic.
pub async fn seed_guest_account(state: &Arc<crate::AppState>) -> Result<()> {
    let guest = AccountProvisioner::ensure_guest(state)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to seed guest account: {}", e))?;
    tracing::info!("Guest account ready: {} (id {})", guest.username, guest.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_stripped_from_urls() {
        assert_eq!(
            redact_db_url("postgres://user:pw@db.local:5432/app"),
            "postgres://db.local:5432/app"
        );
        assert_eq!(redact_db_url("sqlite://data/app.db"), "sqlite://data/app.db");
        assert_eq!(redact_db_url("@host/app"), "(redacted)host/app");
        assert_eq!(redact_db_url("data/app.db"), "(redacted)");
    }
}

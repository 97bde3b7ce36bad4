use std::str::FromStr;

use anyhow::Context;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions, Executor};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./src/db/migrations");

pub const MEMORY_DB_URL: &str = "memory://";

pub fn is_memory_url(db_url: &str) -> bool {
    db_url.trim() == MEMORY_DB_URL
}

pub async fn connect_and_migrate(db_url: &str) -> anyhow::Result<AnyPool> {
    sqlx::any::install_default_drivers();

    let url = sqlite_url_with_mode(db_url);
    let options = AnyConnectOptions::from_str(&url)
        .with_context(|| format!("invalid SITEBOOK_DB_URL: {db_url}"))?
        .disable_statement_logging();

    let pool = AnyPoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .context("failed to open document database")?;

    if url.starts_with("sqlite://") {
        pool.execute("PRAGMA journal_mode = WAL;")
            .await
            .context("failed to set sqlite WAL mode")?;
    }

    MIGRATOR
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    Ok(pool)
}

/// Sqlite urls get forward slashes and `mode=rwc` so a fresh file is created
/// on first start. Other urls pass through untouched.
fn sqlite_url_with_mode(db_url: &str) -> String {
    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        return db_url.to_string();
    };

    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let mut path = path.replace('\\', "/");
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        path.insert(0, '/');
    }

    let query = if query.is_empty() { "mode=rwc" } else { query };
    format!("sqlite://{path}?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_urls_pass_through() {
        assert_eq!(
            sqlite_url_with_mode("postgres://localhost/sitebook"),
            "postgres://localhost/sitebook"
        );
    }

    #[test]
    fn sqlite_urls_get_create_mode() {
        assert_eq!(
            sqlite_url_with_mode("sqlite://./sitebook.db"),
            "sqlite://./sitebook.db?mode=rwc"
        );
        assert_eq!(
            sqlite_url_with_mode("sqlite://./sitebook.db?mode=ro"),
            "sqlite://./sitebook.db?mode=ro"
        );
    }

    #[test]
    fn drive_letter_paths_are_normalized() {
        assert_eq!(
            sqlite_url_with_mode(r"sqlite://D:\sites\sitebook.db"),
            "sqlite:///D:/sites/sitebook.db?mode=rwc"
        );
    }

    #[test]
    fn memory_url_is_recognized() {
        assert!(is_memory_url("memory://"));
        assert!(!is_memory_url("sqlite://memory.db"));
    }
}

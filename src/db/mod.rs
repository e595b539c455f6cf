/// Record store for toolhub
///
/// Manages the SQLite connection pool, embedded migrations, and the typed
/// records for tools, users, comments, media and analytics events.

pub mod analytics;
pub mod comment;
pub mod media;
pub mod tool;
pub mod user;

use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> MarketResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// Create a migrated in-memory pool
///
/// A single connection keeps every query on the same in-memory database.
pub async fn create_memory_pool() -> MarketResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Run migrations embedded at compile time from ./migrations
pub async fn run_migrations(pool: &SqlitePool) -> MarketResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| MarketError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> MarketResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Store timestamps as fixed-width RFC 3339 text so they sort lexically
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn parse_timestamp(s: &str) -> MarketResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MarketError::Internal(format!("Invalid timestamp '{}': {}", s, e)))
}

pub(crate) fn parse_optional_timestamp(s: Option<String>) -> MarketResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_timestamp).transpose()
}

/// New record identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// True when the error is a unique-constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

/// True when the error is a unique-constraint violation on the given column
pub fn is_unique_violation_on(err: &sqlx::Error, column: &str) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation() && e.message().contains(column))
        .unwrap_or(false)
}

/// Attempts for writes that can lose a first-insert race
pub const UNIQUE_RACE_ATTEMPTS: u32 = 2;

/// Run `op` again when it loses a unique-constraint race
///
/// `op` runs at most `attempts` times; the last result is returned as is.
pub async fn retry_on_unique<T, F, Fut>(attempts: u32, mut op: F) -> MarketResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MarketResult<T>>,
{
    let mut tried = 1;
    loop {
        match op().await {
            Err(MarketError::Database(e)) if is_unique_violation(&e) && tried < attempts => {
                debug!("Unique constraint race, retrying ({}/{})", tried, attempts);
                tried += 1;
            }
            other => return other,
        }
    }
}

/// Declare a string-backed enum stored as TEXT
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> $crate::error::MarketResult<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::error::MarketError::Validation(format!(
                        "Invalid {}: {}",
                        $label, s
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

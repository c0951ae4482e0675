//! Database connection contract.
//!
//! The CLI never talks to a driver directly: it asks the loaded
//! application for its [`DataSource`] and drives the connection lifecycle
//! through it (`initialize` → work → `destroy`).

pub mod migrator;
mod pool;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::Serialize;

use crate::config::{CambusaConfig, ConfigError};

pub use migrator::MigrationFile;
pub use pool::SqlxDataSource;

/// Boxed future returned by the object-safe [`DataSource`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Supported database backends, derived from the connection URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Sqlite,
    Postgres,
    Mysql,
}

impl DatabaseKind {
    /// Infer the backend from a connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(DatabaseKind::Sqlite),
            "postgres" | "postgresql" => Some(DatabaseKind::Postgres),
            "mysql" | "mariadb" => Some(DatabaseKind::Mysql),
            _ => None,
        }
    }

    /// Positional bind placeholder for parameter `n` (1-based).
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            DatabaseKind::Postgres => format!("${n}"),
            DatabaseKind::Sqlite | DatabaseKind::Mysql => "?".to_string(),
        }
    }
}

/// Connection options, as read from the `database` section of the manifest.
///
/// This is also what the migration tool receives, so the serialized field
/// names follow the tool's expectations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceOptions {
    #[serde(rename = "type")]
    pub kind: DatabaseKind,
    pub url: String,
    pub pool_size: u32,
    pub migrations: String,
    pub migrations_table: String,
}

impl DataSourceOptions {
    pub const DEFAULT_MIGRATIONS_DIR: &'static str = "migrations";
    pub const DEFAULT_MIGRATIONS_TABLE: &'static str = "cambusa_migrations";

    /// Build options from the `database.*` keys.
    ///
    /// Returns `Ok(None)` when no `database.url` is configured.
    pub fn from_config(config: &CambusaConfig) -> Result<Option<Self>, ConfigError> {
        let url: Option<String> = config.get_or("database.url", None)?;
        let Some(url) = url else {
            return Ok(None);
        };
        let kind = DatabaseKind::from_url(&url).ok_or_else(|| ConfigError::TypeMismatch {
            key: "database.url".to_string(),
            expected: "sqlite:, postgres: or mysql: URL",
        })?;
        let migrations_table: String = config.get_or(
            "database.migrations_table",
            Self::DEFAULT_MIGRATIONS_TABLE.to_string(),
        )?;
        if !is_identifier(&migrations_table) {
            return Err(ConfigError::TypeMismatch {
                key: "database.migrations_table".to_string(),
                expected: "SQL identifier",
            });
        }
        Ok(Some(DataSourceOptions {
            kind,
            url,
            pool_size: config.get_or("database.pool_size", 1u32)?.max(1),
            migrations: config.get_or(
                "database.migrations",
                Self::DEFAULT_MIGRATIONS_DIR.to_string(),
            )?,
            migrations_table,
        }))
    }

    /// Absolute migrations directory for a project rooted at `root`.
    pub fn migrations_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.migrations)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

/// A migration recorded as applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub name: String,
    pub timestamp: i64,
}

/// Errors raised by a [`DataSource`].
#[derive(Debug)]
pub enum DataSourceError {
    /// The connection could not be established.
    Connect(Box<dyn std::error::Error + Send + Sync>),
    /// An operation needed a live connection but `initialize` was not called.
    NotInitialized,
    /// A migration file failed to apply; it was rolled back.
    Migration {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Any other driver error.
    Database(Box<dyn std::error::Error + Send + Sync>),
    Io(std::io::Error),
}

impl DataSourceError {
    pub fn connect(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataSourceError::Connect(Box::new(err))
    }
}

impl std::fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceError::Connect(err) => write!(f, "Failed to connect to database: {err}"),
            DataSourceError::NotInitialized => write!(f, "Database connection is not initialized"),
            DataSourceError::Migration { name, source } => {
                write!(f, "Migration '{name}' failed: {source}")
            }
            DataSourceError::Database(err) => write!(f, "Database error: {err}"),
            DataSourceError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for DataSourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataSourceError::Connect(err)
            | DataSourceError::Database(err)
            | DataSourceError::Migration { source: err, .. } => Some(err.as_ref()),
            DataSourceError::Io(err) => Some(err),
            DataSourceError::NotInitialized => None,
        }
    }
}

impl From<sqlx::Error> for DataSourceError {
    fn from(err: sqlx::Error) -> Self {
        DataSourceError::Database(Box::new(err))
    }
}

impl From<std::io::Error> for DataSourceError {
    fn from(err: std::io::Error) -> Self {
        DataSourceError::Io(err)
    }
}

/// The application's database connection.
///
/// Object-safe so the loaded application can hold any backend (or a test
/// double) behind `Box<dyn DataSource>`.
pub trait DataSource: Send + Sync {
    /// Connection options this source was built from.
    fn options(&self) -> &DataSourceOptions;

    /// Whether `initialize` has completed and `destroy` has not been called since.
    fn is_initialized(&self) -> bool;

    /// Open the connection. A no-op when already initialized.
    fn initialize(&self) -> BoxFuture<'_, Result<(), DataSourceError>>;

    /// Apply every pending migration, returning the ones applied in order.
    fn run_migrations(&self) -> BoxFuture<'_, Result<Vec<AppliedMigration>, DataSourceError>>;

    /// Migrations already recorded as applied, oldest first.
    fn applied_migrations(&self)
        -> BoxFuture<'_, Result<Vec<AppliedMigration>, DataSourceError>>;

    /// Close the connection. A no-op when not initialized.
    fn destroy(&self) -> BoxFuture<'_, Result<(), DataSourceError>>;
}

//! File-based migration runner.
//!
//! Migrations are `*.sql` files named `<timestamp>-<name>.sql`. Names sort
//! chronologically, so applying in file-name order applies in creation order.
//! Each file runs in its own transaction together with its bookkeeping row.

use std::path::{Path, PathBuf};

use sqlx::{AnyConnection, AnyPool, Executor, Row};

use super::{AppliedMigration, DataSourceError, DataSourceOptions};

/// A migration file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File stem, e.g. `1700000000000-create-users`.
    pub name: String,
    pub timestamp: i64,
    pub path: PathBuf,
}

/// List the `*.sql` migrations in `dir`, sorted by name.
///
/// A missing directory simply has no migrations.
pub fn discover(dir: &Path) -> Result<Vec<MigrationFile>, DataSourceError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !path.extension().is_some_and(|ext| ext == "sql") {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        files.push(MigrationFile {
            timestamp: timestamp_prefix(&name),
            name,
            path,
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Leading numeric prefix of a migration name, or `0` when there is none.
pub fn timestamp_prefix(name: &str) -> i64 {
    name.split('-')
        .next()
        .and_then(|prefix| prefix.parse().ok())
        .unwrap_or(0)
}

pub(crate) async fn ensure_table(
    pool: &AnyPool,
    options: &DataSourceOptions,
) -> Result<(), DataSourceError> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (name VARCHAR(255) NOT NULL PRIMARY KEY, timestamp BIGINT NOT NULL)",
        options.migrations_table
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

pub(crate) async fn applied(
    pool: &AnyPool,
    options: &DataSourceOptions,
) -> Result<Vec<AppliedMigration>, DataSourceError> {
    let sql = format!(
        "SELECT name, timestamp FROM {} ORDER BY name",
        options.migrations_table
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter()
        .map(|row| -> Result<AppliedMigration, DataSourceError> {
            Ok(AppliedMigration {
                name: row.try_get("name")?,
                timestamp: row.try_get("timestamp")?,
            })
        })
        .collect()
}

pub(crate) async fn run_pending(
    pool: &AnyPool,
    options: &DataSourceOptions,
    dir: &Path,
) -> Result<Vec<AppliedMigration>, DataSourceError> {
    ensure_table(pool, options).await?;
    let done = applied(pool, options).await?;
    let insert = format!(
        "INSERT INTO {} (name, timestamp) VALUES ({}, {})",
        options.migrations_table,
        options.kind.placeholder(1),
        options.kind.placeholder(2)
    );

    let mut ran = Vec::new();
    for file in discover(dir)? {
        if done.iter().any(|m| m.name == file.name) {
            continue;
        }
        let script = std::fs::read_to_string(&file.path)?;
        apply(pool, &file, &script, &insert)
            .await
            .map_err(|err| DataSourceError::Migration {
                name: file.name.clone(),
                source: Box::new(err),
            })?;

        tracing::info!(migration = %file.name, "migration applied");
        ran.push(AppliedMigration {
            name: file.name,
            timestamp: file.timestamp,
        });
    }
    Ok(ran)
}

/// Run one migration and record it, in a single transaction.
async fn apply(
    pool: &AnyPool,
    file: &MigrationFile,
    script: &str,
    insert: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let conn: &mut AnyConnection = &mut tx;
    conn.execute(sqlx::raw_sql(script)).await?;
    conn.execute(
        sqlx::query(insert)
            .bind(file.name.clone())
            .bind(file.timestamp),
    )
    .await?;
    tx.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_prefix_parses_leading_digits() {
        assert_eq!(timestamp_prefix("1700000000000-create-users"), 1_700_000_000_000);
        assert_eq!(timestamp_prefix("create-users"), 0);
    }

    #[test]
    fn discover_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1700000000002-b.sql"), "").unwrap();
        std::fs::write(dir.path().join("1700000000001-a.sql"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();

        let files = discover(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["1700000000001-a", "1700000000002-b"]);
        assert_eq!(files[0].timestamp, 1_700_000_000_001);
    }

    #[test]
    fn discover_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(&dir.path().join("nope")).unwrap().is_empty());
    }
}

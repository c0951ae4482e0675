use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use super::{migrator, AppliedMigration, BoxFuture, DataSource, DataSourceError, DataSourceOptions};

/// [`DataSource`] backed by an `sqlx::AnyPool`.
///
/// The pool is created lazily by [`DataSource::initialize`] and dropped by
/// [`DataSource::destroy`]; cloning the pool out of the lock keeps the lock
/// out of every `.await`.
pub struct SqlxDataSource {
    options: DataSourceOptions,
    migrations_dir: PathBuf,
    pool: Mutex<Option<AnyPool>>,
}

impl SqlxDataSource {
    /// Create an uninitialized source for a project rooted at `root`.
    pub fn new(options: DataSourceOptions, root: &Path) -> Self {
        let migrations_dir = options.migrations_dir(root);
        Self {
            options,
            migrations_dir,
            pool: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<AnyPool>> {
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live_pool(&self) -> Result<AnyPool, DataSourceError> {
        self.slot().clone().ok_or(DataSourceError::NotInitialized)
    }
}

impl DataSource for SqlxDataSource {
    fn options(&self) -> &DataSourceOptions {
        &self.options
    }

    fn is_initialized(&self) -> bool {
        self.slot().is_some()
    }

    fn initialize(&self) -> BoxFuture<'_, Result<(), DataSourceError>> {
        Box::pin(async move {
            if self.is_initialized() {
                return Ok(());
            }
            sqlx::any::install_default_drivers();
            let pool = AnyPoolOptions::new()
                .max_connections(self.options.pool_size)
                .connect(&self.options.url)
                .await
                .map_err(DataSourceError::connect)?;
            tracing::debug!(kind = ?self.options.kind, "database connection initialized");
            *self.slot() = Some(pool);
            Ok(())
        })
    }

    fn run_migrations(&self) -> BoxFuture<'_, Result<Vec<AppliedMigration>, DataSourceError>> {
        Box::pin(async move {
            let pool = self.live_pool()?;
            migrator::run_pending(&pool, &self.options, &self.migrations_dir).await
        })
    }

    fn applied_migrations(
        &self,
    ) -> BoxFuture<'_, Result<Vec<AppliedMigration>, DataSourceError>> {
        Box::pin(async move {
            let pool = self.live_pool()?;
            migrator::ensure_table(&pool, &self.options).await?;
            migrator::applied(&pool, &self.options).await
        })
    }

    fn destroy(&self) -> BoxFuture<'_, Result<(), DataSourceError>> {
        Box::pin(async move {
            let pool = self.slot().take();
            if let Some(pool) = pool {
                pool.close().await;
                tracing::debug!("database connection closed");
            }
            Ok(())
        })
    }
}

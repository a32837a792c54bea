//! SQLite database handle for the control plane.

use std::path::Path;
use std::sync::Arc;

use kokoa_core::db::{DatabaseError, open_pool, open_pool_in_memory};
use sqlx::{Pool, Sqlite};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

/// Cloneable handle to the control plane database.
///
/// Clones share the pool and the write lock, so at most one write
/// transaction is in flight per process.
#[derive(Clone)]
pub struct ControlPlaneDatabase {
    pool: Pool<Sqlite>,
    write_lock: Arc<Mutex<()>>,
}

impl ControlPlaneDatabase {
    /// Open or create a database at the given path and apply migrations.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let pool = open_pool(path).await?;
        let db = Self::from_pool(pool);
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let pool = open_pool_in_memory().await?;
        let db = Self::from_pool(pool);
        db.run_migrations().await?;
        Ok(db)
    }

    fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Control plane database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Acquire the single-writer lock. Hold the guard for the whole write.
    pub(super) async fn writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}

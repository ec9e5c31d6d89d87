//! Reachability probe for the SQLite store.

use acctlink_core::storage::facade::HealthProbe;

use super::pool::DatabasePool;

/// Reports the database healthy when a trivial query succeeds on both pools.
#[derive(Clone)]
pub struct SqliteHealthProbe {
    pool: DatabasePool,
}

impl SqliteHealthProbe {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl HealthProbe for SqliteHealthProbe {
    async fn is_healthy(&self) -> bool {
        if self.pool.writer.is_closed() || self.pool.reader.is_closed() {
            return false;
        }
        match sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool.reader)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("SQLite health probe failed: {e}");
                false
            }
        }
    }
}

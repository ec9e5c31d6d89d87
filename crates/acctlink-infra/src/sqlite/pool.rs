//! Connection pools for the persistent link store.
//!
//! Link sessions, challenge records and submissions all change through
//! conditional UPDATEs whose `rows_affected` decides who won a race. Funnelling
//! every write through one connection keeps those checks and the
//! session-plus-challenge transactions strictly ordered; reads (listings,
//! the reachability check) go through a separate read-only pool.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Reader and writer handles onto one acctlink database file.
#[derive(Clone)]
pub struct DatabasePool {
    /// Read-only connections for lookups, listings and the health check.
    pub reader: SqlitePool,
    /// The only connection allowed to mutate link state.
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open (creating if needed) the database at `database_url` and bring its
    /// schema up to date with the embedded `migrations/` directory.
    ///
    /// Fails if the file cannot be opened or a migration does not apply; the
    /// caller treats either as "persistent store unavailable".
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // WAL lets listings run while a finalize transaction is open.
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(base_opts.clone())
            .await?;

        // The read-only pool cannot see tables that do not exist yet.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(base_opts.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }
}

/// SQLite URL for `acctlink.db` inside `data_dir`, created on first connect.
pub fn database_url_in(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("acctlink.db").display())
}

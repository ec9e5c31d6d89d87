//! Application state wiring storage and services together.
//!
//! AppState holds the concrete service instances used by both CLI commands
//! and REST API handlers. The storage facade always carries the in-memory
//! fallback store; the SQLite store is attached as the persistent backend
//! when the database can be opened.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use acctlink_core::repository::box_store::BoxLinkStore;
use acctlink_core::service::catalog::default_providers;
use acctlink_core::service::review::ReviewQueue;
use acctlink_core::service::workflow::LinkWorkflow;
use acctlink_core::storage::facade::StorageFacade;
use acctlink_core::storage::memory::MemoryLinkStore;
use acctlink_infra::config::{load_link_config, resolve_data_dir};
use acctlink_infra::sqlite::health::SqliteHealthProbe;
use acctlink_infra::sqlite::link_store::SqliteLinkStore;
use acctlink_infra::sqlite::pool::{DatabasePool, database_url_in};
use acctlink_types::config::LinkConfig;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<LinkWorkflow>,
    pub review: Arc<ReviewQueue>,
    pub storage: Arc<StorageFacade>,
    pub config: Arc<LinkConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, open the database,
    /// seed providers and wire services.
    ///
    /// `database_url` overrides the default `{data_dir}/acctlink.db`.
    pub async fn init(database_url: Option<&str>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_link_config(&data_dir).await;

        let db_url = database_url
            .map(str::to_string)
            .unwrap_or_else(|| database_url_in(&data_dir));

        let mut storage = StorageFacade::new(BoxLinkStore::new(MemoryLinkStore::new()))
            .with_fallback_allowed(config.allow_fallback)
            .with_probe_timeout(Duration::from_millis(config.health_check_timeout_ms));

        match DatabasePool::new(&db_url).await {
            Ok(pool) => {
                tracing::debug!(url = %db_url, "Persistent store opened");
                storage = storage.with_persistent(
                    BoxLinkStore::new(SqliteLinkStore::new(pool.clone())),
                    SqliteHealthProbe::new(pool),
                );
            }
            Err(e) if config.allow_fallback => {
                tracing::warn!(
                    "Could not open database at {db_url}: {e}; running on the in-memory store only"
                );
            }
            Err(e) => {
                anyhow::bail!("could not open database at {db_url} and fallback is disabled: {e}");
            }
        }

        Self::from_parts(Arc::new(storage), config, data_dir).await
    }

    /// Wire services over an already-built storage facade.
    pub async fn from_parts(
        storage: Arc<StorageFacade>,
        config: LinkConfig,
        data_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        storage.seed_providers(&default_providers()).await?;

        let workflow = LinkWorkflow::new(storage.clone(), config.clone());
        let review = ReviewQueue::new(storage.clone(), config.reviewer_id.clone());

        Ok(Self {
            workflow: Arc::new(workflow),
            review: Arc::new(review),
            storage,
            config: Arc::new(config),
            data_dir,
        })
    }
}

//! Storage facade routing between the persistent and fallback stores.
//!
//! Health of the persistent store is probed freshly at the start of every
//! logical operation via [`StorageFacade::select`]. The returned
//! [`SelectedStore`] is then used for every read and write of that
//! operation, so an operation begun against the persistent store never
//! drifts to the fallback store halfway through.

use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::time::Duration;

use acctlink_types::error::{LinkError, RepositoryError};
use acctlink_types::provider::ProviderConfig;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::repository::box_store::BoxLinkStore;

/// Reachability check for a storage backend.
pub trait HealthProbe: Send + Sync {
    /// `true` if the backend can currently serve requests.
    fn is_healthy(&self) -> impl Future<Output = bool> + Send;
}

/// Object-safe version of [`HealthProbe`].
pub trait HealthProbeDyn: Send + Sync {
    fn is_healthy_boxed(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

impl<T: HealthProbe> HealthProbeDyn for T {
    fn is_healthy_boxed(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(self.is_healthy())
    }
}

/// Probe that always reports the same answer.
///
/// Used for backends that cannot go away (tests, embedded stores).
#[derive(Debug, Clone, Copy)]
pub struct StaticHealth(pub bool);

impl HealthProbe for StaticHealth {
    async fn is_healthy(&self) -> bool {
        self.0
    }
}

/// Which backend served an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Persistent,
    Fallback,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Persistent => write!(f, "persistent"),
            Backend::Fallback => write!(f, "fallback"),
        }
    }
}

/// A store pinned for the duration of one logical operation.
pub struct SelectedStore<'a> {
    backend: Backend,
    store: &'a BoxLinkStore,
}

impl SelectedStore<'_> {
    pub fn backend(&self) -> Backend {
        self.backend
    }
}

impl Deref for SelectedStore<'_> {
    type Target = BoxLinkStore;

    fn deref(&self) -> &Self::Target {
        self.store
    }
}

struct PersistentBackend {
    store: BoxLinkStore,
    probe: Box<dyn HealthProbeDyn>,
}

/// Single entry point the workflow and review queue use for storage.
pub struct StorageFacade {
    persistent: Option<PersistentBackend>,
    fallback: BoxLinkStore,
    allow_fallback: bool,
    probe_timeout: Duration,
}

impl StorageFacade {
    /// Facade with only the process-local store.
    pub fn new(fallback: BoxLinkStore) -> Self {
        Self {
            persistent: None,
            fallback,
            allow_fallback: true,
            probe_timeout: Duration::from_millis(500),
        }
    }

    /// Attach the persistent store and the probe that decides its health.
    pub fn with_persistent<P: HealthProbe + 'static>(mut self, store: BoxLinkStore, probe: P) -> Self {
        self.persistent = Some(PersistentBackend {
            store,
            probe: Box::new(probe),
        });
        self
    }

    /// When `false`, an unhealthy persistent store fails operations instead
    /// of routing them to the fallback store.
    pub fn with_fallback_allowed(mut self, allow: bool) -> Self {
        self.allow_fallback = allow;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn has_persistent(&self) -> bool {
        self.persistent.is_some()
    }

    /// Probe the persistent store, bounded by the probe timeout.
    async fn persistent_healthy(&self, backend: &PersistentBackend) -> bool {
        match tokio::time::timeout(self.probe_timeout, backend.probe.is_healthy_boxed()).await {
            Ok(healthy) => healthy,
            Err(_) => {
                warn!(timeout_ms = self.probe_timeout.as_millis() as u64, "Persistent store health probe timed out");
                false
            }
        }
    }

    /// Choose the backend for one logical operation.
    pub async fn select(&self) -> Result<SelectedStore<'_>, LinkError> {
        if let Some(backend) = &self.persistent {
            if self.persistent_healthy(backend).await {
                debug!(backend = %Backend::Persistent, "Storage backend selected");
                return Ok(SelectedStore {
                    backend: Backend::Persistent,
                    store: &backend.store,
                });
            }
            if !self.allow_fallback {
                return Err(LinkError::BackendUnavailable(
                    "persistent store unreachable and fallback disabled".to_string(),
                ));
            }
            warn!("Persistent store unhealthy, routing to fallback store");
        }

        debug!(backend = %Backend::Fallback, "Storage backend selected");
        Ok(SelectedStore {
            backend: Backend::Fallback,
            store: &self.fallback,
        })
    }

    /// The persistent store, only if it is configured and healthy right now.
    pub async fn persistent_if_healthy(&self) -> Option<&BoxLinkStore> {
        let backend = self.persistent.as_ref()?;
        if self.persistent_healthy(backend).await {
            Some(&backend.store)
        } else {
            None
        }
    }

    /// Which backend the next operation would use, if any.
    pub async fn current_backend(&self) -> Option<Backend> {
        self.select().await.ok().map(|selected| selected.backend())
    }

    /// Seed reference data into every reachable backend.
    ///
    /// Idempotent per backend: inserts only when that store holds no
    /// provider configs yet.
    pub async fn seed_providers(&self, providers: &[ProviderConfig]) -> Result<(), RepositoryError> {
        seed_store(&self.fallback, Backend::Fallback, providers).await?;

        if let Some(store) = self.persistent_if_healthy().await {
            seed_store(store, Backend::Persistent, providers).await?;
        } else if self.persistent.is_some() {
            warn!("Persistent store unreachable, skipped provider seeding");
        }
        Ok(())
    }
}

async fn seed_store(
    store: &BoxLinkStore,
    backend: Backend,
    providers: &[ProviderConfig],
) -> Result<(), RepositoryError> {
    if store.count_providers().await? > 0 {
        debug!(%backend, "Provider configs already present, skipping seed");
        return Ok(());
    }
    store.insert_providers(providers).await?;
    info!(%backend, count = providers.len(), "Provider configs seeded");
    Ok(())
}

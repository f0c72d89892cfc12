//! Catalog cache
//!
//! Mirrors the remote catalog into memory and the local store. The
//! snapshot is only ever replaced whole: by a restore at startup or by a
//! full three-list fetch. Writes go to the server first and are then
//! reconciled by re-fetching, never patched in locally.

use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, instrument, warn};

use aroma_core::storage::{load_json, save_json};
use aroma_core::validation::validate_mutation;
use aroma_core::{
    keys, Brand, BrandView, CatalogSnapshot, CatalogStats, Category, Clock, EntityId,
    KeyValueStore, Mutation, PerfumeFilter, PerfumeView,
};
use aroma_net::CatalogApi;

use crate::error::{Error, Result};
use crate::lock;

/// Load status for the UI retry affordance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheState {
    pub loading: bool,
    /// Message of the last failed fetch, cleared by the next success
    pub error: Option<String>,
    /// Epoch millis of the last successful fetch
    pub last_synced_at: Option<i64>,
}

/// Result of sending a batch of mutations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    /// Index into the batch and the reason it failed
    pub failed: Vec<(usize, String)>,
}

#[derive(Debug, Default)]
struct LoadState {
    in_flight: usize,
    error: Option<String>,
    last_synced_at: Option<i64>,
}

/// Counts one fetch as in flight until dropped, so a cancelled refresh
/// still clears the loading flag
struct InFlight<'a>(&'a Mutex<LoadState>);

impl<'a> InFlight<'a> {
    fn start(load: &'a Mutex<LoadState>) -> Self {
        lock(load).in_flight += 1;
        Self(load)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut load = lock(self.0);
        load.in_flight = load.in_flight.saturating_sub(1);
    }
}

struct Inner {
    api: Arc<dyn CatalogApi>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    load: Mutex<LoadState>,
}

#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<Inner>,
}

impl CatalogCache {
    pub fn new(api: Arc<dyn CatalogApi>, store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                clock,
                snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
                load: Mutex::new(LoadState::default()),
            }),
        }
    }

    /// Current snapshot. Cheap; later replacements do not affect it.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        match self.inner.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn state(&self) -> CacheState {
        let load = lock(&self.inner.load);
        CacheState {
            loading: load.in_flight > 0,
            error: load.error.clone(),
            last_synced_at: load.last_synced_at,
        }
    }

    /// Restore from the store, or fetch when there is nothing usable
    pub async fn initialize(&self) -> Result<()> {
        match load_json::<CatalogSnapshot>(self.inner.store.as_ref(), keys::CATALOG_SNAPSHOT) {
            Ok(Some(snapshot)) if !snapshot.is_empty() => {
                let stats = snapshot.stats();
                self.replace(snapshot);
                info!(
                    categories = stats.categories,
                    brands = stats.brands,
                    perfumes = stats.perfumes,
                    "Catalog restored from local store"
                );
                return Ok(());
            }
            Ok(_) => debug!("No stored catalog, fetching"),
            Err(e) => warn!(error = %e, "Could not read stored catalog, fetching"),
        }
        self.refresh().await
    }

    /// Fetch all three lists and replace the snapshot.
    ///
    /// The fetches run concurrently and succeed or fail together; on
    /// failure the current snapshot stays and the error is recorded.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let in_flight = InFlight::start(&self.inner.load);

        let api = &self.inner.api;
        let fetched = tokio::try_join!(api.categories(), api.brands(), api.perfumes());

        let result = match fetched {
            Ok((categories, brands, perfumes)) => {
                let snapshot = CatalogSnapshot::assemble(categories, brands, perfumes);
                let stats = snapshot.stats();
                self.replace(snapshot);
                info!(
                    categories = stats.categories,
                    brands = stats.brands,
                    perfumes = stats.perfumes,
                    "Catalog refreshed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Catalog fetch failed, keeping current snapshot");
                Err(Error::from(e))
            }
        };

        drop(in_flight);
        let mut load = lock(&self.inner.load);
        match &result {
            Ok(()) => {
                load.error = None;
                load.last_synced_at = Some(self.inner.clock.now_millis());
            }
            Err(e) => load.error = Some(e.user_message()),
        }
        result
    }

    /// Send one write, then reconcile.
    ///
    /// A failed reconcile does not fail the write; it shows up in
    /// [`state`](Self::state) instead.
    #[instrument(skip(self, mutation), fields(kind = %mutation.kind(), verb = mutation.verb()))]
    pub async fn mutate(&self, mutation: Mutation) -> Result<()> {
        validate_mutation(&mutation)?;
        self.send(&mutation).await?;
        info!("Catalog write accepted");

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Reconcile after write failed");
        }
        Ok(())
    }

    /// Send every mutation, then reconcile once.
    ///
    /// Invalid or rejected items are collected and the rest still go
    /// out. A rejected token stops the batch.
    pub async fn apply_batch(&self, mutations: Vec<Mutation>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for (index, mutation) in mutations.iter().enumerate() {
            let sent = match validate_mutation(mutation) {
                Ok(()) => self.send(mutation).await,
                Err(e) => Err(e.into()),
            };
            match sent {
                Ok(()) => outcome.applied += 1,
                Err(e) if e.is_unauthorized() => return Err(e),
                Err(e) => outcome.failed.push((index, e.user_message())),
            }
        }

        info!(
            applied = outcome.applied,
            failed = outcome.failed.len(),
            "Catalog batch sent"
        );
        if outcome.applied > 0 {
            if let Err(e) = self.refresh().await {
                warn!(error = %e, "Reconcile after batch failed");
            }
        }
        Ok(outcome)
    }

    async fn send(&self, mutation: &Mutation) -> Result<()> {
        let api = &self.inner.api;
        match mutation {
            Mutation::Create(draft) => api.create(draft).await?,
            Mutation::Update { id, draft } => api.update(*id, draft).await?,
            Mutation::Delete { kind, id } => api.delete(*kind, *id).await?,
        }
        Ok(())
    }

    /// Forget the snapshot, in memory and on disk
    pub fn clear(&self) -> Result<()> {
        self.set_snapshot(CatalogSnapshot::default());
        lock(&self.inner.load).last_synced_at = None;
        self.inner.store.remove(keys::CATALOG_SNAPSHOT)?;
        info!("Catalog cache cleared");
        Ok(())
    }

    pub fn categories(&self) -> Vec<Category> {
        self.snapshot().categories.clone()
    }

    pub fn category_by_id(&self, id: EntityId) -> Option<Category> {
        self.snapshot().category_by_id(id).cloned()
    }

    pub fn brand_by_id(&self, id: EntityId) -> Option<Brand> {
        self.snapshot().brand_by_id(id).cloned()
    }

    pub fn all_perfumes(&self) -> Vec<PerfumeView> {
        self.snapshot().all_perfumes()
    }

    pub fn all_brands(&self) -> Vec<BrandView> {
        self.snapshot().all_brands()
    }

    pub fn search(&self, filter: &PerfumeFilter) -> Vec<PerfumeView> {
        self.snapshot().search(filter)
    }

    pub fn stats(&self) -> CatalogStats {
        self.snapshot().stats()
    }

    fn replace(&self, snapshot: CatalogSnapshot) {
        if let Err(e) = save_json(self.inner.store.as_ref(), keys::CATALOG_SNAPSHOT, &snapshot) {
            warn!(error = %e, "Failed to persist catalog snapshot");
        }
        self.set_snapshot(snapshot);
    }

    fn set_snapshot(&self, snapshot: CatalogSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.inner.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{Category, ContentApi};
use crate::categories::error::CategoryError;

pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(5 * 60);

type Categories = Arc<Vec<Category>>;
type PendingFetch = Shared<BoxFuture<'static, Result<Categories, CategoryError>>>;

struct CacheEntry {
    data: Categories,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    pending: Option<PendingFetch>,
    /// Bumped by `clear_cache`; a fetch only settles the cache if the
    /// generation it started under is still current.
    generation: u64,
}

/// Memoizes the category list for a freshness window and lets concurrent
/// callers share one in-flight request.
///
/// The lock is only ever held for bookkeeping, never across an await.
/// Waiting happens on a [`Shared`] future that every caller clones.
pub struct CategoryCache {
    api: Arc<dyn ContentApi>,
    freshness: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl CategoryCache {
    pub fn new(api: Arc<dyn ContentApi>) -> Self {
        Self::with_freshness(api, DEFAULT_FRESHNESS)
    }

    pub fn with_freshness(api: Arc<dyn ContentApi>, freshness: Duration) -> Self {
        Self {
            api,
            freshness,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Returns the cached list while it is fresh, otherwise fetches it.
    /// `force_refresh` skips the freshness check but still joins a fetch
    /// that is already running.
    pub async fn get_categories(&self, force_refresh: bool) -> Result<Categories, CategoryError> {
        let pending = {
            let mut state = self.lock();

            if !force_refresh {
                if let Some(entry) = state
                    .entry
                    .as_ref()
                    .filter(|entry| entry.fetched_at.elapsed() < self.freshness)
                {
                    debug!("serving {} categories from cache", entry.data.len());
                    return Ok(Arc::clone(&entry.data));
                }
            }

            match &state.pending {
                Some(pending) => {
                    debug!("joining in-flight category fetch");
                    pending.clone()
                }
                None => {
                    let pending = self.start_fetch(state.generation);
                    state.pending = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Category>, CategoryError> {
        let categories = self.get_categories(false).await?;
        Ok(categories
            .iter()
            .find(|category| category.name == name)
            .cloned())
    }

    /// Drops the cached list and forgets any in-flight fetch. Callers
    /// already waiting on that fetch still get its result, but it no
    /// longer populates the cache.
    pub fn clear_cache(&self) {
        let mut state = self.lock();
        state.entry = None;
        state.pending = None;
        state.generation += 1;
        debug!("category cache cleared");
    }

    /// True when a non-empty list is cached, fresh or not.
    pub fn has_cache(&self) -> bool {
        self.lock()
            .entry
            .as_ref()
            .is_some_and(|entry| !entry.data.is_empty())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_fetch(&self, generation: u64) -> PendingFetch {
        let api = Arc::clone(&self.api);
        let state = Arc::downgrade(&self.state);

        debug!("fetching categories");
        async move {
            let outcome = api
                .list_categories()
                .await
                .map(Arc::new)
                .map_err(CategoryError::from);

            settle(&state, generation, &outcome);
            outcome
        }
        .boxed()
        .shared()
    }
}

fn settle(
    state: &Weak<Mutex<CacheState>>,
    generation: u64,
    outcome: &Result<Categories, CategoryError>,
) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);

    if state.generation != generation {
        debug!("discarding category fetch superseded by a cache clear");
        return;
    }

    state.pending = None;
    match outcome {
        Ok(data) => {
            info!("cached {} categories", data.len());
            state.entry = Some(CacheEntry {
                data: Arc::clone(data),
                fetched_at: Instant::now(),
            });
        }
        Err(e) => {
            warn!("category fetch failed, invalidating cache: {}", e);
            state.entry = None;
        }
    }
}

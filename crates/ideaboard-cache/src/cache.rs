use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, broadcast};
use tracing::debug;

use crate::tag::Tag;
use crate::watch::{QueryState, Watched};

type Value = Arc<dyn Any + Send + Sync>;

/// Slot a running fetch leaves its outcome in, errors included. The leader
/// holds the lock for the whole fetch.
type Flight = Arc<Mutex<Option<Value>>>;

/// Process-local query cache keyed by [`Tag`].
///
/// Reads go through [`query`](Self::query): a cached entry is served as is,
/// anything else is fetched once (concurrent readers of the same tag share
/// that fetch and its outcome) and stored. [`invalidate`](Self::invalidate)
/// evicts every covered entry and notifies [`Watched`] queries so they
/// refetch.
///
/// Cloning is cheap; all clones share one table.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    state: RwLock<CacheState>,

    /// Fetches currently running, one per tag.
    flights: Mutex<HashMap<Tag, Flight>>,

    /// Logical clock ordering fetch starts against invalidations.
    clock: AtomicU64,

    invalidations: broadcast::Sender<Tag>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Tag, Value>,

    /// Tag -> clock tick of its latest invalidation. An entry is dropped
    /// once a covering tag is invalidated later.
    invalidated_at: HashMap<Tag, u64>,

    /// Tick of the last [`QueryCache::clear`].
    cleared_at: u64,
}

impl CacheState {
    fn last_invalidation(&self, tag: &Tag) -> u64 {
        tag.ancestors()
            .filter_map(|t| self.invalidated_at.get(&t).copied())
            .max()
            .unwrap_or(0)
            .max(self.cleared_at)
    }
}

enum Role {
    /// Someone else is fetching; wait on their slot.
    Join(Flight),
    Lead(Flight, OwnedMutexGuard<Option<Value>>),
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (invalidations, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(CacheInner {
                state: RwLock::new(CacheState::default()),
                flights: Mutex::new(HashMap::new()),
                clock: AtomicU64::new(0),
                invalidations,
            }),
        }
    }

    fn tick(&self) -> u64 {
        self.inner.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Cached value for `tag` if present and of type `T`.
    pub async fn get<T>(&self, tag: &Tag) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let state = self.inner.state.read().await;
        state.entries.get(tag)?.clone().downcast::<T>().ok()
    }

    pub async fn is_fresh(&self, tag: &Tag) -> bool {
        self.inner.state.read().await.entries.contains_key(tag)
    }

    /// Serve `tag` from the cache or run `fetch` and store its result.
    ///
    /// Readers arriving while a fetch for `tag` runs get that fetch's
    /// outcome, error or not. Errors are never stored, and neither is a
    /// value whose fetch started before a covering invalidation, so the
    /// next read goes back to the source.
    pub async fn query<T, E, F, Fut>(&self, tag: Tag, fetch: F) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        loop {
            if let Some(value) = self.get::<T>(&tag).await {
                debug!(%tag, "cache hit");
                return Ok(value);
            }

            match self.board(&tag).await {
                Role::Join(flight) => {
                    let outcome = {
                        let slot = flight.lock().await;
                        slot.as_ref()
                            .and_then(|v| v.downcast_ref::<Result<Arc<T>, E>>())
                            .cloned()
                    };
                    if let Some(outcome) = outcome {
                        debug!(%tag, "joined running fetch");
                        return outcome;
                    }
                    // Leader went away without an outcome of our type.
                    self.land(&tag, &flight).await;
                }
                Role::Lead(flight, mut slot) => {
                    // A previous leader may have landed since our miss.
                    let outcome = match self.get::<T>(&tag).await {
                        Some(value) => Ok(value),
                        None => self.fetch_and_store(&tag, fetch).await,
                    };
                    *slot = Some(Arc::new(outcome.clone()));
                    self.land(&tag, &flight).await;
                    return outcome;
                }
            }
        }
    }

    async fn fetch_and_store<T, E, F, Fut>(&self, tag: &Tag, fetch: F) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        debug!(%tag, "cache miss");
        let started = self.tick();
        let value = Arc::new(fetch().await?);

        let mut state = self.inner.state.write().await;
        if state.last_invalidation(tag) > started {
            debug!(%tag, "invalidated during fetch, not stored");
        } else {
            state.entries.insert(tag.clone(), value.clone());
        }
        Ok(value)
    }

    /// Join the running fetch for `tag`, or register a new one and lead it.
    async fn board(&self, tag: &Tag) -> Role {
        let mut flights = self.inner.flights.lock().await;
        if let Some(flight) = flights.get(tag) {
            return Role::Join(flight.clone());
        }
        let flight = Flight::default();
        let slot = flight.clone().lock_owned().await;
        flights.insert(tag.clone(), flight.clone());
        Role::Lead(flight, slot)
    }

    /// Unregister `flight` unless a newer one already replaced it.
    async fn land(&self, tag: &Tag, flight: &Flight) {
        let mut flights = self.inner.flights.lock().await;
        if flights.get(tag).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            flights.remove(tag);
        }
    }

    /// Evict `tag` and every tag it covers, then notify watchers.
    pub async fn invalidate(&self, tag: &Tag) {
        let now = self.tick();
        let evicted = {
            let mut state = self.inner.state.write().await;
            // Covered tags are superseded by this tick through `ancestors`.
            state.invalidated_at.retain(|t, _| !tag.covers(t));
            state.invalidated_at.insert(tag.clone(), now);

            let before = state.entries.len();
            state.entries.retain(|key, _| !tag.covers(key));
            before - state.entries.len()
        };

        debug!(%tag, evicted, "invalidated");
        // No receivers is fine: nothing is watching.
        let _ = self.inner.invalidations.send(tag.clone());
    }

    /// Drop every entry and all bookkeeping, and make watchers refetch.
    ///
    /// Fetches still running when this is called do not store their result.
    pub async fn clear(&self) {
        let now = self.tick();
        {
            let mut state = self.inner.state.write().await;
            state.entries.clear();
            state.invalidated_at.clear();
            state.cleared_at = now;
        }
        self.inner.flights.lock().await.clear();

        debug!("cache cleared");
        let _ = self.inner.invalidations.send(Tag::root());
    }

    pub async fn len(&self) -> usize {
        self.inner.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Tag> {
        self.inner.invalidations.subscribe()
    }

    /// Start a query that keeps itself current.
    ///
    /// A background task fetches `tag` right away, then again every time an
    /// invalidation covers it, publishing each outcome on the returned
    /// handle. The task stops once the handle is dropped.
    pub fn watch<T, E, F, Fut>(&self, tag: Tag, fetch: F) -> Watched<T, E>
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let (tx, rx) = tokio::sync::watch::channel(QueryState::Loading);
        // Subscribe before the first fetch so no invalidation slips between.
        let mut invalidations = self.subscribe();
        let cache = self.clone();
        let watched_tag = tag.clone();

        tokio::spawn(async move {
            loop {
                let state = match cache.query(tag.clone(), &fetch).await {
                    Ok(value) => QueryState::Ready(value),
                    Err(e) => QueryState::Failed(e),
                };
                if tx.send(state).is_err() {
                    return;
                }

                loop {
                    tokio::select! {
                        _ = tx.closed() => return,
                        received = invalidations.recv() => match received {
                            Ok(t) if t.covers(&tag) => break,
                            Ok(_) => continue,
                            // Missed some; one of them may have been ours.
                            Err(broadcast::error::RecvError::Lagged(_)) => break,
                            Err(broadcast::error::RecvError::Closed) => return,
                        },
                    }
                }
                debug!(%tag, "watched query refetching");
            }
        });

        Watched::new(rx, self.clone(), watched_tag)
    }
}

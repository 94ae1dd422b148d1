use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::cache::QueryCache;
use crate::tag::Tag;

/// Latest outcome of a watched query.
pub enum QueryState<T, E> {
    /// First fetch still running.
    Loading,
    Ready(Arc<T>),
    /// Last fetch failed. Stays until an invalidation or [`Watched::refetch`].
    Failed(E),
}

impl<T, E: Clone> Clone for QueryState<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Loading => Self::Loading,
            Self::Ready(value) => Self::Ready(value.clone()),
            Self::Failed(e) => Self::Failed(e.clone()),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for QueryState<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str("Loading"),
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

impl<T, E> QueryState<T, E> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Handle on a query started with [`QueryCache::watch`].
///
/// Dropping it stops the background refetch task.
pub struct Watched<T, E> {
    rx: watch::Receiver<QueryState<T, E>>,
    cache: QueryCache,
    tag: Tag,
}

impl<T, E: Clone> Watched<T, E> {
    pub(crate) fn new(rx: watch::Receiver<QueryState<T, E>>, cache: QueryCache, tag: Tag) -> Self {
        Self { rx, cache, tag }
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn state(&self) -> QueryState<T, E> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published state. Returns `false` once the
    /// background task is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the query leaves `Loading` and return that state.
    pub async fn settled(&mut self) -> QueryState<T, E> {
        loop {
            {
                let state = self.rx.borrow_and_update();
                if !state.is_loading() {
                    return state.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }

    /// Force a refetch, e.g. to recover from `Failed`. Goes through the
    /// cache's invalidation, so other readers of this tag refetch as well.
    pub async fn refetch(&self) {
        self.cache.invalidate(&self.tag).await;
    }
}

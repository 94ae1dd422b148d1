pub mod table;

use std::sync::Arc;

use ideaboard_backend::Backend;
use ideaboard_cache::QueryCache;
use ideaboard_types::{Comment, Entity, Idea, Message, User};

pub use table::Table;

/// Entry point of the data-access layer.
///
/// Both collaborators are built by the caller and handed in, so tests can
/// swap the backend for [`ideaboard_backend::MemoryBackend`] or any other
/// [`Backend`].
pub struct DataClient<B> {
    backend: Arc<B>,
    cache: QueryCache,
}

impl<B> Clone for DataClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<B: Backend> DataClient<B> {
    pub fn new(backend: B, cache: QueryCache) -> Self {
        Self::with_shared(Arc::new(backend), cache)
    }

    pub fn with_shared(backend: Arc<B>, cache: QueryCache) -> Self {
        Self { backend, cache }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn table<E: Entity>(&self) -> Table<E, B> {
        Table::new(self.backend.clone(), self.cache.clone())
    }

    pub fn messages(&self) -> Table<Message, B> {
        self.table()
    }

    pub fn comments(&self) -> Table<Comment, B> {
        self.table()
    }

    pub fn ideas(&self) -> Table<Idea, B> {
        self.table()
    }

    pub fn users(&self) -> Table<User, B> {
        self.table()
    }
}

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use ideaboard_backend::{Backend, BackendError};
use ideaboard_cache::{QueryCache, Tag, Watched};
use ideaboard_types::Entity;

/// Typed reads and mutations for one entity's table.
///
/// Reads go through the cache under `[table]` (list) and `[table, id]`
/// (single row). Every mutation invalidates `[table]` once the backend has
/// accepted it, which by tag hierarchy also refreshes the single-row reads;
/// a rejected mutation leaves the cache untouched. Nothing is applied
/// optimistically.
pub struct Table<E, B> {
    backend: Arc<B>,
    cache: QueryCache,
    _entity: PhantomData<fn() -> E>,
}

impl<E, B> Clone for Table<E, B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            cache: self.cache.clone(),
            _entity: PhantomData,
        }
    }
}

fn decode<E: Entity>(row: Value) -> Result<E, BackendError> {
    Ok(serde_json::from_value(row)?)
}

impl<E: Entity, B: Backend> Table<E, B> {
    pub fn new(backend: Arc<B>, cache: QueryCache) -> Self {
        Self {
            backend,
            cache,
            _entity: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        E::TABLE
    }

    pub fn list_tag() -> Tag {
        Tag::table(E::TABLE)
    }

    pub fn record_tag(id: Uuid) -> Tag {
        Tag::record(E::TABLE, id)
    }

    async fn fetch_all(backend: Arc<B>) -> Result<Vec<E>, BackendError> {
        backend
            .select_all(E::TABLE)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn fetch_one(backend: Arc<B>, id: Uuid) -> Result<E, BackendError> {
        decode(backend.select_by_id(E::TABLE, id).await?)
    }

    /// All rows, served from the cache while fresh.
    pub async fn list(&self) -> Result<Arc<Vec<E>>, BackendError> {
        let backend = self.backend.clone();
        self.cache
            .query(Self::list_tag(), || Self::fetch_all(backend))
            .await
    }

    /// One row by id. Missing rows fail with a not-found [`BackendError`].
    pub async fn get(&self, id: Uuid) -> Result<Arc<E>, BackendError> {
        let backend = self.backend.clone();
        self.cache
            .query(Self::record_tag(id), || Self::fetch_one(backend, id))
            .await
    }

    /// The list as a live query: refetched whenever `[table]` is invalidated.
    pub fn watch_list(&self) -> Watched<Vec<E>, BackendError> {
        let backend = self.backend.clone();
        self.cache
            .watch(Self::list_tag(), move || Self::fetch_all(backend.clone()))
    }

    pub fn watch_one(&self, id: Uuid) -> Watched<E, BackendError> {
        let backend = self.backend.clone();
        self.cache
            .watch(Self::record_tag(id), move || Self::fetch_one(backend.clone(), id))
    }

    /// Insert a row; the backend assigns `id` and `created_at`.
    pub async fn add(&self, new: &E::New) -> Result<E, BackendError> {
        let row = serde_json::to_value(new)?;
        let stored = self
            .backend
            .insert(E::TABLE, row)
            .await
            .inspect_err(|e| warn!(table = E::TABLE, "insert rejected: {}", e))?;
        self.invalidate().await;

        let record: E = decode(stored)?;
        info!(table = E::TABLE, id = %record.id(), "row added");
        Ok(record)
    }

    /// Replace every mutable column of `record`, matched by its own id.
    ///
    /// Whatever the server holds for those columns is overwritten, including
    /// changes made since `record` was read. Prefer [`patch`](Self::patch)
    /// for single-field edits.
    pub async fn update(&self, record: &E) -> Result<E, BackendError> {
        self.patch(record.id(), &record.to_patch()).await
    }

    /// Change only the columns present in `patch`.
    pub async fn patch(&self, id: Uuid, patch: &E::Patch) -> Result<E, BackendError> {
        let changes = serde_json::to_value(patch)?;
        let stored = self
            .backend
            .update(E::TABLE, id, changes)
            .await
            .inspect_err(|e| warn!(table = E::TABLE, %id, "update rejected: {}", e))?;
        self.invalidate().await;

        info!(table = E::TABLE, %id, "row updated");
        decode(stored)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), BackendError> {
        self.backend
            .delete(E::TABLE, id)
            .await
            .inspect_err(|e| warn!(table = E::TABLE, %id, "delete rejected: {}", e))?;
        self.invalidate().await;

        info!(table = E::TABLE, %id, "row deleted");
        Ok(())
    }

    /// Evict the list and every single-row read of this table.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&Self::list_tag()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataClient;
    use ideaboard_backend::MemoryBackend;
    use ideaboard_types::{Comment, Idea, IdeaPatch, NewComment, NewIdea, NewUser, User};

    fn client() -> DataClient<MemoryBackend> {
        DataClient::new(MemoryBackend::new(), QueryCache::new())
    }

    fn new_idea(title: &str, description: Option<&str>) -> NewIdea {
        NewIdea {
            title: title.into(),
            description: description.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn add_shows_up_in_next_list() {
        let client = client();
        let ideas = client.ideas();
        let before = ideas.list().await.unwrap();
        assert!(before.is_empty());

        let added = ideas.add(&new_idea("Ship faster", Some("now"))).await.unwrap();
        let after = ideas.list().await.unwrap();

        assert_eq!(after.len(), 1);
        assert_eq!(after[0], added);
        assert_eq!(added.title, "Ship faster");
        assert_eq!(added.description.as_deref(), Some("now"));
        assert!(!added.id.is_nil());
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let client = client();
        let ideas = client.ideas();

        let a = ideas.add(&new_idea("a", None)).await.unwrap();
        ideas.delete(a.id).await.unwrap();
        let b = ideas.add(&new_idea("a", None)).await.unwrap();

        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn list_is_cached_until_invalidated() {
        let client = client();
        let ideas = client.ideas();

        ideas.list().await.unwrap();
        ideas.list().await.unwrap();
        assert_eq!(client.backend().round_trips(), 1);

        client.cache().invalidate(&Tag::table("ideas")).await;
        ideas.list().await.unwrap();
        assert_eq!(client.backend().round_trips(), 2);
    }

    #[tokio::test]
    async fn delete_removes_exactly_one() {
        let client = client();
        let ideas = client.ideas();
        let keep = ideas.add(&new_idea("keep", None)).await.unwrap();
        let gone = ideas.add(&new_idea("gone", None)).await.unwrap();
        assert_eq!(ideas.list().await.unwrap().len(), 2);

        ideas.delete(gone.id).await.unwrap();
        let after = ideas.list().await.unwrap();

        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, keep.id);
    }

    #[tokio::test]
    async fn second_delete_is_not_found_and_changes_nothing() {
        let client = client();
        let ideas = client.ideas();
        let id = ideas.add(&new_idea("a", None)).await.unwrap().id;
        ideas.add(&new_idea("b", None)).await.unwrap();

        ideas.delete(id).await.unwrap();
        let after_first = ideas.list().await.unwrap();

        let err = ideas.delete(id).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(ideas.list().await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn failed_mutation_keeps_cache_fresh() {
        let client = client();
        let ideas = client.ideas();
        ideas.list().await.unwrap();

        assert!(ideas.delete(Uuid::new_v4()).await.is_err());
        assert!(client.cache().is_fresh(&Tag::table("ideas")).await);
    }

    #[tokio::test]
    async fn patch_touches_only_one_field_of_one_row() {
        let client = client();
        let ideas = client.ideas();
        let target = ideas.add(&new_idea("target", Some("old"))).await.unwrap();
        let other = ideas.add(&new_idea("other", Some("old"))).await.unwrap();

        let patch = IdeaPatch {
            description: Some(Some("draft".into())),
            ..Default::default()
        };
        ideas.patch(target.id, &patch).await.unwrap();

        let after = ideas.list().await.unwrap();
        let edited = after.iter().find(|i| i.id == target.id).unwrap();
        assert_eq!(edited.description.as_deref(), Some("draft"));
        assert_eq!(edited.title, target.title);
        assert_eq!(edited.created_at, target.created_at);
        assert_eq!(edited.user_id, target.user_id);
        assert_eq!(after.iter().find(|i| i.id == other.id), Some(&other));
    }

    #[tokio::test]
    async fn update_replaces_mutable_columns() {
        let client = client();
        let ideas = client.ideas();
        let mut idea = ideas.add(&new_idea("t", Some("d"))).await.unwrap();

        idea.title = "renamed".into();
        idea.description = None;
        let stored = ideas.update(&idea).await.unwrap();

        assert_eq!(stored, idea);
        assert_eq!(*ideas.get(idea.id).await.unwrap(), idea);
    }

    #[tokio::test]
    async fn mutation_refreshes_single_row_reads() {
        let client = client();
        let ideas = client.ideas();
        let idea = ideas.add(&new_idea("t", None)).await.unwrap();
        ideas.get(idea.id).await.unwrap();

        let patch = IdeaPatch {
            title: Some("t2".into()),
            ..Default::default()
        };
        ideas.patch(idea.id, &patch).await.unwrap();

        assert_eq!(ideas.get(idea.id).await.unwrap().title, "t2");
    }

    #[tokio::test]
    async fn get_missing_row_fails() {
        let client = client();
        let err = client.users().get(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn watched_list_follows_mutations() {
        let client = client();
        let ideas = client.ideas();
        let mut watched = ideas.watch_list();
        assert_eq!(watched.settled().await.value().map(|v| v.len()), Some(0));

        ideas.add(&new_idea("a", None)).await.unwrap();
        assert!(watched.changed().await);
        assert_eq!(watched.state().value().map(|v| v.len()), Some(1));
    }

    #[tokio::test]
    async fn watched_row_follows_patches() {
        let client = client();
        let ideas = client.ideas();
        let idea = ideas.add(&new_idea("before", None)).await.unwrap();

        let mut watched = ideas.watch_one(idea.id);
        assert_eq!(watched.tag(), &Tag::record("ideas", idea.id));
        assert_eq!(watched.settled().await.value().map(|i| i.title.clone()), Some("before".into()));

        let patch = IdeaPatch {
            title: Some("after".into()),
            ..Default::default()
        };
        ideas.patch(idea.id, &patch).await.unwrap();

        assert!(watched.changed().await);
        let state = watched.state();
        let row = state.value().unwrap();
        assert_eq!(row.title, "after");
        assert_eq!(row.created_at, idea.created_at);
    }

    #[tokio::test]
    async fn tables_are_independent() {
        let client = client();
        let user = client
            .users()
            .add(&NewUser {
                username: "ada".into(),
                email: "ada@example.com".into(),
            })
            .await
            .unwrap();
        let comment = client
            .comments()
            .add(&NewComment {
                user_id: Some(user.id),
                idea_id: Some(Uuid::new_v4()),
                content: "dangling idea_id is the backend's business".into(),
            })
            .await
            .unwrap();

        let users: Arc<Vec<User>> = client.users().list().await.unwrap();
        let comments: Arc<Vec<Comment>> = client.comments().list().await.unwrap();
        let ideas: Arc<Vec<Idea>> = client.ideas().list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(comments[0], comment);
        assert!(ideas.is_empty());
    }
}

//! Live views over one collection, as shown by a dashboard panel.
//!
//! A panel loads its collection on mount, then follows the store
//! subscription and re-normalizes every pushed snapshot. Applying a
//! snapshot never writes back to the store. User actions go through the
//! panel's [`EntityMutator`] while the saving flag is raised.

pub mod selectors;
pub mod stats;

pub use stats::{
    CatalogStats, ClientProjectStats, PanelStats, ProjectStats, StaffStats, TicketStats,
};

use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::collection::{
    Collection, CollectionError, Deletion, EntityMutator, LoadState, PathLocks,
};
use crate::forms::FormState;
use crate::models::Entity;
use crate::store::{DocumentStore, Subscription};

/// Counts in-flight saves. The flag clears when the last guard is dropped,
/// whether the save succeeded, failed or unwound.
#[derive(Debug, Clone, Default)]
pub struct SavingIndicator {
    in_flight: Arc<AtomicUsize>,
}

impl SavingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag until the returned guard is dropped
    pub fn begin(&self) -> SavingGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        SavingGuard {
            in_flight: self.in_flight.clone(),
        }
    }

    /// True while at least one save is in flight
    pub fn is_saving(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}

#[must_use = "the saving flag clears when the guard is dropped"]
#[derive(Debug)]
pub struct SavingGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for SavingGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One collection as a dashboard panel sees it: the normalized list, its
/// load state, the live subscription and the saving flag.
pub struct PanelView<T> {
    mutator: EntityMutator<T>,
    state: LoadState,
    items: Vec<T>,
    subscription: Option<Subscription>,
    saving: SavingIndicator,
}

impl<T: Entity> PanelView<T> {
    /// Panel over the entity's own collection, with its own write locks
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::from_mutator(EntityMutator::new(store, PathLocks::new()))
    }

    /// Panel over a collection stored at a custom path
    pub fn at_path(store: Arc<dyn DocumentStore>, path: &str) -> Self {
        Self::from_mutator(EntityMutator::at_path(store, path, PathLocks::new()))
    }

    /// Panel writing through `mutator`, sharing its path locks
    pub fn from_mutator(mutator: EntityMutator<T>) -> Self {
        Self {
            mutator,
            state: LoadState::Idle,
            items: Vec::new(),
            subscription: None,
            saving: SavingIndicator::new(),
        }
    }

    fn path(&self) -> &str {
        self.mutator.path()
    }

    /// Load state shown by the panel
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// The current normalized list
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Raised while one of the panel's writes is in flight
    pub fn saving(&self) -> &SavingIndicator {
        &self.saving
    }

    /// True while the panel follows store changes
    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Load the collection and start following changes
    pub async fn mount(&mut self) -> Result<(), CollectionError> {
        if !self.state.begin() {
            return Ok(());
        }
        let outcome = self.fetch().await;
        match &outcome {
            Ok(()) => self.state.finish::<CollectionError>(Ok(())),
            Err(e) => {
                warn!(path = %self.path(), error = %e, "Panel failed to load");
                self.state.finish(Err(e));
            }
        }
        outcome
    }

    /// Load again after a failed mount
    pub async fn retry(&mut self) -> Result<(), CollectionError> {
        if self.state.error().is_none() {
            return Ok(());
        }
        self.mount().await
    }

    async fn fetch(&mut self) -> Result<(), CollectionError> {
        let collection = self.mutator.load().await?;
        self.items = collection.items();
        let subscription = self.mutator.store().subscribe(self.mutator.path()).await?;
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Replace the list with a pushed snapshot. Idempotent.
    pub fn apply_snapshot(&mut self, raw: Value) {
        let raw = if raw.is_null() { None } else { Some(raw) };
        self.items = Collection::<T>::from_value(self.path().to_string(), raw).items();
        debug!(path = %self.path(), count = self.items.len(), "Applied snapshot");
    }

    /// Wait for the next pushed change and apply it. `None` when the panel
    /// is not mounted or the listener has ended.
    pub async fn next_change(&mut self) -> Option<&[T]> {
        let raw = self.subscription.as_mut()?.next().await?;
        self.apply_snapshot(raw);
        Some(self.items.as_slice())
    }

    /// Stop following changes
    pub fn unmount(&mut self) {
        self.subscription = None;
        self.state = LoadState::Idle;
    }

    /// Create a record from a validated draft
    pub async fn add(&mut self, draft: T) -> Result<T, CollectionError> {
        let mutator = self.mutator.clone();
        self.save(async move { mutator.add(draft).await }).await
    }

    /// Merge `patch` into the record
    pub async fn update(&mut self, id: &str, patch: Value) -> Result<T, CollectionError> {
        let mutator = self.mutator.clone();
        self.save(async move { mutator.update(id, patch).await }).await
    }

    /// Apply a typed change, such as a status move or a promotion
    pub async fn modify<F>(&mut self, id: &str, change: F) -> Result<T, CollectionError>
    where
        F: FnOnce(&mut T) -> Result<(), CollectionError> + Send,
    {
        let mutator = self.mutator.clone();
        self.save(async move { mutator.modify(id, change).await }).await
    }

    /// Delete a record with its entity's delete policy
    pub async fn delete(&mut self, id: &str) -> Result<Deletion<T>, CollectionError> {
        let mutator = self.mutator.clone();
        self.save(async move { mutator.delete(id).await }).await
    }

    /// Submit a create or edit form
    pub async fn submit(&mut self, form: &FormState<T>) -> Result<T, CollectionError> {
        let mutator = self.mutator.clone();
        self.save(async move { form.submit(&mutator).await }).await
    }

    /// Run one write with the saving flag raised, then reload the list. A
    /// failed write leaves the list as it was.
    async fn save<R>(
        &mut self,
        write: impl Future<Output = Result<R, CollectionError>>,
    ) -> Result<R, CollectionError> {
        let result = {
            let _guard = self.saving.begin();
            write.await
        };
        match &result {
            Ok(_) => self.reload().await,
            Err(e) => warn!(path = %self.path(), error = %e, "Panel save failed"),
        }
        result
    }

    async fn reload(&mut self) {
        match self.mutator.load().await {
            Ok(collection) => self.items = collection.items(),
            Err(e) => warn!(path = %self.path(), error = %e, "Panel reload after save failed"),
        }
    }
}

impl<T: Entity + PanelStats> PanelView<T> {
    /// Aggregates over the current list
    pub fn stats(&self) -> T::Stats {
        T::summarize(&self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Service, StaffMember, Ticket, TicketStatus};
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_saving_guard_clears_on_every_path() {
        let saving = SavingIndicator::new();
        {
            let _guard = saving.begin();
            let _nested = saving.begin();
            assert!(saving.is_saving());
        }
        assert!(!saving.is_saving());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = saving.begin();
            panic!("save failed");
        }));
        assert!(result.is_err());
        assert!(!saving.is_saving());
    }

    #[tokio::test]
    async fn test_mount_follow_unmount() {
        let store = Arc::new(MemoryStore::with_data(json!({
            "services": [{"id": "s1", "title": "SEO"}]
        })));
        let mut panel = PanelView::<Service>::new(store.clone());
        panel.mount().await.unwrap();
        assert!(panel.state().is_ready());
        assert_eq!(panel.items().len(), 1);
        assert_eq!(store.watcher_count(), 1);

        // initial snapshot delivered by the subscription
        assert_eq!(panel.next_change().await.map(|items| items.len()), Some(1));

        store
            .write_path("services", &json!([{"id": "s1", "title": "SEO"}, {"id": "s2", "title": "Ads"}]))
            .await
            .unwrap();
        assert_eq!(panel.next_change().await.map(|items| items.len()), Some(2));

        panel.unmount();
        assert_eq!(store.watcher_count(), 0);
        assert_eq!(panel.state(), &LoadState::Idle);
        assert!(panel.next_change().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_mount_then_retry() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let mut panel = PanelView::<Ticket>::new(store.clone());

        assert!(panel.mount().await.is_err());
        assert!(panel.state().error().is_some());
        assert!(!panel.is_mounted());

        store.set_offline(false);
        panel.retry().await.unwrap();
        assert!(panel.state().is_ready());
        assert!(panel.items().is_empty());
    }

    fn ticket(title: &str) -> Ticket {
        Ticket {
            title: title.to_string(),
            description: "Checkout fails".to_string(),
            category: "bug".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_actions_refresh_items_and_clear_saving() {
        let store = Arc::new(MemoryStore::new());
        let mut panel = PanelView::<Ticket>::new(store.clone());
        panel.mount().await.unwrap();

        let created = panel.add(ticket("Broken checkout")).await.unwrap();
        assert!(!panel.saving().is_saving());
        assert_eq!(panel.items().len(), 1);

        panel
            .modify(&created.id, |t| {
                t.status = TicketStatus::Closed;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(panel.items()[0].status, TicketStatus::Closed);

        let mut form = FormState::<Ticket>::create();
        form.set_field("title", json!("Slow search"));
        assert!(panel.submit(&form).await.is_err());
        assert!(!panel.saving().is_saving());
        assert_eq!(panel.items().len(), 1);

        panel.delete(&created.id).await.unwrap();
        assert!(panel.items().is_empty());
    }

    #[tokio::test]
    async fn test_saving_clears_when_store_is_offline() {
        let store = Arc::new(MemoryStore::with_data(json!({
            "staffdashboard": {"tickets": [{"id": "t1", "title": "Old", "description": "x", "category": "bug"}]}
        })));
        let mut panel = PanelView::<Ticket>::new(store.clone());
        panel.mount().await.unwrap();
        let saving = panel.saving().clone();

        store.set_offline(true);
        let err = panel.update("t1", json!({"title": "New"})).await.unwrap_err();
        assert!(matches!(err, CollectionError::StoreUnavailable(_)));
        assert!(!saving.is_saving());
        assert_eq!(panel.items()[0].title, "Old");
    }

    #[tokio::test]
    async fn test_apply_snapshot_is_idempotent_and_read_only() {
        let store = Arc::new(MemoryStore::new());
        let mut panel = PanelView::<StaffMember>::new(store.clone());
        let raw = json!({"u1": {"name": "Ama", "email": "AMA@agency.test", "status": "on-leave"}});

        panel.apply_snapshot(raw.clone());
        let first = panel.items().to_vec();
        panel.apply_snapshot(raw);
        assert_eq!(panel.items(), first.as_slice());
        assert_eq!(first[0].id, "u1");
        assert_eq!(first[0].email, "ama@agency.test");
        assert_eq!(store.read_path("users").await.unwrap(), None);

        assert_eq!(panel.stats().total, 1);
        assert_eq!(panel.stats().active, 0);
    }
}

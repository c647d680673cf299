pub mod api;
pub mod collection;
pub mod config;
pub mod forms;
pub mod models;
pub mod panels;
pub mod store;
pub mod validation;

use config::Config;
use std::sync::Arc;

use crate::collection::{EntityMutator, PathLocks};
use crate::models::Entity;
use crate::panels::PanelView;
use crate::store::DocumentStore;

/// Shared state handed to every request handler
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    /// Serializes whole-collection rewrites within this process
    pub locks: PathLocks,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config,
            store,
            locks: PathLocks::new(),
        }
    }

    /// Mutator for `T`'s collection
    pub fn mutator<T: Entity>(&self) -> EntityMutator<T> {
        EntityMutator::new(self.store.clone(), self.locks.clone())
    }

    /// Panel whose writes share this state's path locks
    pub fn panel<T: Entity>(&self) -> PanelView<T> {
        PanelView::from_mutator(self.mutator())
    }
}

use serde::Serialize;
use tracing::{debug, warn};

use super::{Collection, CollectionError};
use crate::models::Entity;
use crate::store::{normalize_path, DocumentStore};

/// Fetch and normalize the collection at `path`.
///
/// Records that cannot be decoded are logged and held back from the list;
/// only a store failure is returned as an error.
pub async fn load_collection<T: Entity>(
    store: &dyn DocumentStore,
    path: &str,
) -> Result<Collection<T>, CollectionError> {
    let path = normalize_path(path);
    let raw = store.read_path(&path).await.map_err(|e| {
        warn!(path = %path, error = %e, "Failed to load collection");
        e
    })?;

    let collection = Collection::<T>::from_value(path.clone(), raw);
    debug!(
        path = %path,
        kind = T::KIND,
        count = collection.len(),
        malformed = collection.malformed_count(),
        "Loaded collection"
    );
    Ok(collection)
}

/// Loading lifecycle of one panel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Error(String),
}

impl LoadState {
    /// Enter `Loading`. Allowed from `Idle` (mount) and `Error` (retry).
    pub fn begin(&mut self) -> bool {
        match self {
            LoadState::Idle | LoadState::Error(_) => {
                *self = LoadState::Loading;
                true
            }
            LoadState::Loading | LoadState::Ready => false,
        }
    }

    /// Leave `Loading` with the outcome of the fetch
    pub fn finish<E: std::fmt::Display>(&mut self, outcome: Result<(), E>) {
        if *self != LoadState::Loading {
            return;
        }
        *self = match outcome {
            Ok(()) => LoadState::Ready,
            Err(e) => LoadState::Error(e.to_string()),
        };
    }

    /// True once the first load succeeded
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }

    /// Message of the last failed load
    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }
}

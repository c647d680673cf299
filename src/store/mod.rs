//! Remote document store adapter.
//!
//! The dashboard's data lives in a path-addressed JSON tree. Everything above
//! this module sees three operations: read the value at a path, overwrite the
//! value at a path, and subscribe to changes under a path. There is no
//! partial write: callers persist a collection by rewriting all of it, which
//! means two writers racing on the same collection lose one of the updates.

mod memory;
mod remote;

pub use memory::MemoryStore;
pub use remote::RemoteStore;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Network failure, timeout, or a server-side error
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    /// The store answered but refused the request (bad auth, bad path)
    #[error("document store rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to decode document store response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Value stored at `path`, or `None` when nothing is stored there
    async fn read_path(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Overwrite the whole value at `path`. Writing `Value::Null` clears it.
    async fn write_path(&self, path: &str, value: &Value) -> Result<(), StoreError>;

    /// Listen for changes at, above or below `path`.
    ///
    /// The current snapshot is delivered first, then a fresh snapshot after
    /// every change. Dropping the subscription releases the listener.
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;
}

type CancelFn = Box<dyn FnOnce() + Send + Sync>;

/// Live listener on a store path. Unsubscribes on drop.
pub struct Subscription {
    path: String,
    rx: mpsc::UnboundedReceiver<Value>,
    cancel: Option<CancelFn>,
}

impl Subscription {
    /// `cancel` runs once, on `unsubscribe` or drop
    pub fn new(
        path: impl Into<String>,
        rx: mpsc::UnboundedReceiver<Value>,
        cancel: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            rx,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Path the subscription follows
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next snapshot. `None` once the listener has ended.
    pub async fn next(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Next snapshot if one is already queued
    pub fn try_next(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }

    /// Stop listening. Dropping the subscription does the same.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
            tracing::debug!(path = %self.path, "Unsubscribed from store path");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// `"/a//b/"` -> `"a/b"`
pub fn normalize_path(path: &str) -> String {
    segments(path).join("/")
}

/// Non-empty `/`-separated parts of a path
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// True when a change at one path can affect the value at the other
pub fn paths_overlap(a: &str, b: &str) -> bool {
    let a = segments(a);
    let b = segments(b);
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Build the configured store backend
pub fn connect(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Memory => {
            let store = match &config.seed_file {
                Some(path) => MemoryStore::from_file(path)
                    .with_context(|| format!("Failed to seed memory store from {}", path.display()))?,
                None => MemoryStore::new(),
            };
            info!("Using in-memory document store");
            Ok(Arc::new(store))
        }
        StoreBackend::Remote => {
            let url = config
                .url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .context("store.url must be set when store.backend = \"remote\"")?;
            let store = RemoteStore::new(url, config.secret.clone(), config.timeout())?;
            info!(url = %store.base_url(), "Using remote document store");
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/staffdashboard//tickets/"), "staffdashboard/tickets");
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("/"), "");
    }

    #[test]
    fn test_paths_overlap() {
        assert!(paths_overlap("services", "services"));
        assert!(paths_overlap("services", "services/0/title"));
        assert!(paths_overlap("services/0", "services"));
        assert!(paths_overlap("", "anything"));
        assert!(!paths_overlap("services", "servicesArchive"));
        assert!(!paths_overlap("staffdashboard/tickets", "staffdashboard/projects"));
    }
}

//! In-process document store used for development and tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use super::{normalize_path, paths_overlap, segments, DocumentStore, StoreError, Subscription};

struct Watcher {
    id: u64,
    path: String,
    tx: mpsc::UnboundedSender<Value>,
}

type Watchers = Mutex<Vec<Watcher>>;

/// JSON tree behind a lock, with the same read/overwrite/subscribe
/// semantics as the remote store.
pub struct MemoryStore {
    root: RwLock<Value>,
    watchers: Arc<Watchers>,
    next_watcher: AtomicU64,
    offline: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_data(Value::Null)
    }

    /// Store holding `root` as its whole tree
    pub fn with_data(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
            watchers: Arc::new(Mutex::new(Vec::new())),
            next_watcher: AtomicU64::new(1),
            offline: AtomicBool::new(false),
        }
    }

    /// Seed the tree from a JSON export of the remote database
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
        let root: Value = serde_json::from_str(&content)
            .with_context(|| "Failed to parse seed file as JSON")?;
        Ok(Self::with_data(root))
    }

    /// Make every operation fail with `StoreError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live subscriptions
    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    fn snapshot(&self, path: &str) -> Option<Value> {
        let root = self.root.read();
        let mut node = &*root;
        for segment in segments(path) {
            node = match node {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if is_empty(node) {
            None
        } else {
            Some(node.clone())
        }
    }

    fn notify(&self, changed: &str) {
        let mut watchers = self.watchers.lock();
        watchers.retain(|w| {
            if !paths_overlap(&w.path, changed) {
                return true;
            }
            let value = self.snapshot(&w.path).unwrap_or(Value::Null);
            w.tx.send(value).is_ok()
        });
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.iter().all(Value::is_null),
        _ => false,
    }
}

/// Set `value` at `path` under `node`, creating intermediate objects.
/// Arrays on the way are turned into index-keyed objects when the index
/// does not exist yet, the way the remote store treats sparse arrays.
fn set_at(node: &mut Value, path: &[&str], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return;
    };

    if let Value::Array(items) = node {
        if let Some(slot) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            set_at(slot, rest, value);
            return;
        }
        let map: Map<String, Value> = items
            .drain(..)
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *node = Value::Object(map);
    }

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        if rest.is_empty() && value.is_null() {
            map.remove(*head);
            return;
        }
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        set_at(child, rest, value);
        if is_empty(child) {
            map.remove(*head);
        }
    }
}

fn remove_watcher(watchers: &Weak<Watchers>, id: u64) {
    if let Some(watchers) = watchers.upgrade() {
        watchers.lock().retain(|w| w.id != id);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_path(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_online()?;
        Ok(self.snapshot(path))
    }

    async fn write_path(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        self.ensure_online()?;
        let path = normalize_path(path);
        {
            let mut root = self.root.write();
            set_at(&mut root, &segments(&path), value.clone());
        }
        self.notify(&path);
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        self.ensure_online()?;
        let path = normalize_path(path);
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_watcher.fetch_add(1, Ordering::Relaxed);

        // Held across snapshot and registration so a concurrent write is
        // either in the snapshot or notified afterwards
        {
            let mut watchers = self.watchers.lock();
            let _ = tx.send(self.snapshot(&path).unwrap_or(Value::Null));
            watchers.push(Watcher {
                id,
                path: path.clone(),
                tx,
            });
        }

        let watchers = Arc::downgrade(&self.watchers);
        Ok(Subscription::new(path, rx, move || remove_watcher(&watchers, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_write_nested() {
        let store = MemoryStore::new();
        assert_eq!(store.read_path("services").await.unwrap(), None);

        store
            .write_path("staffdashboard/tickets", &json!([{"id": "t1"}]))
            .await
            .unwrap();
        assert_eq!(
            store.read_path("staffdashboard/tickets").await.unwrap(),
            Some(json!([{"id": "t1"}]))
        );
        assert_eq!(
            store.read_path("staffdashboard/tickets/0/id").await.unwrap(),
            Some(json!("t1"))
        );
        assert!(store.read_path("staffdashboard").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_write_null_clears_path() {
        let store = MemoryStore::with_data(json!({"services": [{"id": "s1"}], "other": 1}));
        store.write_path("/services/", &Value::Null).await.unwrap();
        assert_eq!(store.read_path("services").await.unwrap(), None);
        assert_eq!(store.read_path("other").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_write_into_array_index() {
        let store = MemoryStore::with_data(json!({"services": [{"id": "s1"}, {"id": "s2"}]}));
        store.write_path("services/1/title", &json!("Web")).await.unwrap();
        assert_eq!(
            store.read_path("services/1").await.unwrap(),
            Some(json!({"id": "s2", "title": "Web"}))
        );
    }

    #[tokio::test]
    async fn test_subscription_receives_snapshots() {
        let store = MemoryStore::with_data(json!({"services": [{"id": "s1"}]}));
        let mut sub = store.subscribe("services").await.unwrap();
        assert_eq!(sub.next().await, Some(json!([{"id": "s1"}])));

        store.write_path("services", &json!([])).await.unwrap();
        assert_eq!(sub.next().await, Some(Value::Null));

        store.write_path("pricingPackages", &json!([{"id": "p"}])).await.unwrap();
        assert!(sub.try_next().is_none());

        store.write_path("", &json!({"services": [{"id": "s9"}]})).await.unwrap();
        assert_eq!(sub.next().await, Some(json!([{"id": "s9"}])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscribe_during_writes_sees_final_value() {
        for _ in 0..20 {
            let store = Arc::new(MemoryStore::new());
            let writer = {
                let store = store.clone();
                tokio::spawn(async move {
                    for i in 1..=200 {
                        store.write_path("counter", &json!(i)).await.unwrap();
                    }
                })
            };
            let mut sub = store.subscribe("counter").await.unwrap();
            writer.await.unwrap();

            let mut last = None;
            while let Some(value) = sub.try_next() {
                last = Some(value);
            }
            assert_eq!(last, Some(json!(200)));
        }
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let store = MemoryStore::new();
        let sub = store.subscribe("users").await.unwrap();
        let other = store.subscribe("services").await.unwrap();
        assert_eq!(store.watcher_count(), 2);
        drop(sub);
        assert_eq!(store.watcher_count(), 1);
        other.unsubscribe();
        assert_eq!(store.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.read_path("users").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.write_path("users", &json!([])).await.is_err());
        store.set_offline(false);
        assert!(store.read_path("users").await.is_ok());
    }
}

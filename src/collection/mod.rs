//! In-memory view of one store collection.
//!
//! A collection is persisted as a single JSON value, either an array of
//! records or a map keyed by record id. [`Collection`] keeps every raw entry
//! in its original position, decodes what it can, and writes the whole value
//! back in the shape it was read in. Entries that fail to decode are kept
//! verbatim so a rewrite never destroys them.

pub mod loader;
pub mod mutator;

pub use loader::{load_collection, LoadState};
pub use mutator::{Deletion, EntityMutator, PathLocks, SubEntityChange, SubEntityTarget};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::models::{de, decode, Entity};
use crate::store::StoreError;
use crate::validation::FieldErrors;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("{0}")]
    ValidationFailed(FieldErrors),
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CollectionError {
    /// `NotFound` for a record of `kind`
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl From<FieldErrors> for CollectionError {
    fn from(errors: FieldErrors) -> Self {
        Self::ValidationFailed(errors)
    }
}

/// How the collection value is laid out in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    List,
    Keyed,
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Parsed(T),
    /// Raw value that did not decode; written back untouched
    Malformed(Value),
}

#[derive(Debug, Clone)]
struct Entry<T> {
    /// Map key for keyed collections
    key: Option<String>,
    slot: Slot<T>,
}

#[derive(Debug, Clone)]
pub struct Collection<T> {
    path: String,
    shape: Shape,
    entries: Vec<Entry<T>>,
}

impl<T: Entity> Collection<T> {
    /// A collection with nothing stored yet; written back as a list
    pub fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            shape: Shape::List,
            entries: Vec::new(),
        }
    }

    /// Decode a raw collection value. Never fails: undecodable records and
    /// unexpected top-level values are logged and set aside.
    pub fn from_value(path: impl Into<String>, raw: Option<Value>) -> Self {
        let path = path.into();
        let (shape, raw_entries): (Shape, Vec<(Option<String>, Value)>) = match raw {
            None | Some(Value::Null) => (Shape::List, Vec::new()),
            Some(Value::Array(items)) => (
                Shape::List,
                items
                    .into_iter()
                    .filter(|v| !v.is_null())
                    .map(|v| (None, v))
                    .collect(),
            ),
            Some(Value::Object(map)) => (
                Shape::Keyed,
                de::ordered_entries(map)
                    .into_iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (Some(k), v))
                    .collect(),
            ),
            Some(other) => {
                warn!(
                    path = %path,
                    kind = T::KIND,
                    "Malformed remote data: expected a list or keyed map, found {}",
                    value_kind(&other)
                );
                (Shape::List, Vec::new())
            }
        };

        let entries = raw_entries
            .into_iter()
            .map(|(key, raw)| {
                let slot = decode_entry::<T>(&path, key.as_deref(), raw);
                Entry { key, slot }
            })
            .collect();

        Self {
            path,
            shape,
            entries,
        }
    }

    /// Normalized store path the collection was read from
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the collection was stored as a list or a keyed map
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Decoded records in storage order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|e| match &e.slot {
            Slot::Parsed(item) => Some(item),
            Slot::Malformed(_) => None,
        })
    }

    /// Clones of the decoded records, in stored order
    pub fn items(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored records that failed to decode and are carried as raw JSON
    pub fn malformed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.slot, Slot::Malformed(_)))
            .count()
    }

    /// Decoded record with this id
    pub fn get(&self, id: &str) -> Option<&T> {
        self.iter().find(|item| item.id() == id)
    }

    /// Mutable access to the decoded record with this id
    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.entries.iter_mut().find_map(|e| match &mut e.slot {
            Slot::Parsed(item) if item.id() == id => Some(item),
            _ => None,
        })
    }

    /// True when any entry, decoded or not, already uses `id`
    pub fn contains_id(&self, id: &str) -> bool {
        self.entries.iter().any(|e| {
            e.key.as_deref() == Some(id)
                || match &e.slot {
                    Slot::Parsed(item) => item.id() == id,
                    Slot::Malformed(raw) => raw.get("id").and_then(Value::as_str) == Some(id),
                }
        })
    }

    /// Append a record. In a keyed collection the record id is its key.
    pub fn push(&mut self, item: T) {
        let key = match self.shape {
            Shape::Keyed => Some(item.id().to_string()),
            Shape::List => None,
        };
        self.entries.push(Entry {
            key,
            slot: Slot::Parsed(item),
        });
    }

    /// Remove a decoded record and return it
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let index = self
            .entries
            .iter()
            .position(|e| matches!(&e.slot, Slot::Parsed(item) if item.id() == id))?;
        match self.entries.remove(index).slot {
            Slot::Parsed(item) => Some(item),
            Slot::Malformed(_) => None,
        }
    }

    /// Replace the decoded records with `items`, keeping malformed entries
    /// where they were. Entries are matched back to their keys by id.
    pub fn replace_items(&mut self, items: Vec<T>) {
        let mut keys: Vec<(String, Option<String>)> = self
            .entries
            .iter()
            .filter_map(|e| match &e.slot {
                Slot::Parsed(item) => Some((item.id().to_string(), e.key.clone())),
                Slot::Malformed(_) => None,
            })
            .collect();
        let malformed: Vec<Entry<T>> = self
            .entries
            .drain(..)
            .filter(|e| matches!(e.slot, Slot::Malformed(_)))
            .collect();

        for item in items {
            let key = match keys.iter().position(|(id, _)| id == item.id()) {
                Some(i) => keys.swap_remove(i).1,
                None if self.shape == Shape::Keyed => Some(item.id().to_string()),
                None => None,
            };
            self.entries.push(Entry {
                key,
                slot: Slot::Parsed(item),
            });
        }
        self.entries.extend(malformed);
    }

    /// The whole collection in its stored shape
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut values = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let value = match &entry.slot {
                Slot::Parsed(item) => serde_json::to_value(item)?,
                Slot::Malformed(raw) => raw.clone(),
            };
            values.push((entry.key.clone(), value));
        }

        Ok(match self.shape {
            Shape::List => Value::Array(values.into_iter().map(|(_, v)| v).collect()),
            Shape::Keyed => {
                let mut map = Map::new();
                for (i, (key, value)) in values.into_iter().enumerate() {
                    let key = key
                        .filter(|k| !k.is_empty())
                        .or_else(|| value.get("id").and_then(Value::as_str).map(str::to_string))
                        .unwrap_or_else(|| i.to_string());
                    map.insert(key, value);
                }
                Value::Object(map)
            }
        })
    }
}

fn decode_entry<T: Entity>(path: &str, key: Option<&str>, raw: Value) -> Slot<T> {
    let mut candidate = raw.clone();
    if let (Some(key), Value::Object(record)) = (key, &mut candidate) {
        let missing = record
            .get("id")
            .map(|id| id.is_null() || id.as_str() == Some(""))
            .unwrap_or(true);
        if missing {
            record.insert("id".to_string(), Value::String(key.to_string()));
        }
    }

    match decode::<T>(candidate) {
        Ok(item) => Slot::Parsed(item),
        Err(errors) => {
            let id = raw.get("id").and_then(|id| id.as_str()).unwrap_or("");
            warn!(
                path = %path,
                kind = T::KIND,
                key = key.unwrap_or(""),
                id = id,
                "Malformed remote data, record skipped: {}",
                errors.summary()
            );
            Slot::Malformed(raw)
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Service, Ticket, TicketStatus};
    use serde_json::json;

    #[test]
    fn test_list_with_holes() {
        let c: Collection<Service> = Collection::from_value(
            "services",
            Some(json!([null, {"id": "s1", "title": "SEO"}, null, {"id": "s2", "title": "Ads"}])),
        );
        assert_eq!(c.shape(), Shape::List);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("s2").unwrap().title, "Ads");
    }

    #[test]
    fn test_keyed_map_uses_key_as_id() {
        let c: Collection<Service> = Collection::from_value(
            "services",
            Some(json!({"-Nabc": {"title": "SEO"}, "-Nxyz": {"id": "custom", "title": "Ads"}})),
        );
        assert_eq!(c.shape(), Shape::Keyed);
        assert!(c.get("-Nabc").is_some());
        assert!(c.get("custom").is_some());

        let value = c.to_value().unwrap();
        assert_eq!(value["-Nabc"]["title"], "SEO");
        assert_eq!(value["-Nxyz"]["id"], "custom");
    }

    #[test]
    fn test_non_collection_value_is_empty() {
        let c: Collection<Service> = Collection::from_value("services", Some(json!("oops")));
        assert!(c.is_empty());
        assert_eq!(c.to_value().unwrap(), json!([]));
    }

    #[test]
    fn test_malformed_records_survive_rewrite() {
        let mut c: Collection<Ticket> = Collection::from_value(
            "staffdashboard/tickets",
            Some(json!([
                {"id": "t1", "title": "A", "status": "open"},
                {"id": "t2", "title": "B", "status": "escalated"}
            ])),
        );
        assert_eq!(c.len(), 1);
        assert_eq!(c.malformed_count(), 1);
        assert!(c.contains_id("t2"));

        c.get_mut("t1").unwrap().status = TicketStatus::Closed;
        let value = c.to_value().unwrap();
        assert_eq!(value[0]["status"], "closed");
        assert_eq!(value[1], json!({"id": "t2", "title": "B", "status": "escalated"}));
    }

    #[test]
    fn test_replace_items_keeps_keys() {
        let mut c: Collection<Service> = Collection::from_value(
            "services",
            Some(json!({"k1": {"id": "a", "title": "A"}, "k2": {"id": "b", "title": "B"}})),
        );
        let mut items = c.items();
        items.reverse();
        items.push(Service {
            id: "c".to_string(),
            ..Default::default()
        });
        c.replace_items(items);

        let value = c.to_value().unwrap();
        assert_eq!(value["k1"]["id"], "a");
        assert_eq!(value["k2"]["id"], "b");
        assert_eq!(value["c"]["id"], "c");
        assert_eq!(c.iter().next().unwrap().id, "b");
    }

    #[test]
    fn test_load_is_idempotent() {
        let raw = json!([{"id": "s1", "title": "SEO", "features": "audit, reports", "order": "3"}]);
        let first: Collection<Service> = Collection::from_value("services", Some(raw));
        let second: Collection<Service> =
            Collection::from_value("services", Some(first.to_value().unwrap()));
        assert_eq!(first.items(), second.items());
        assert_eq!(second.items()[0].features, vec!["audit", "reports"]);
    }
}

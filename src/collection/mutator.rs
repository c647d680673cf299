//! Whole-collection read-modify-write for one entity type.
//!
//! Every mutation loads the full collection, changes one record,
//! re-normalizes and validates it, then overwrites the collection. The store
//! has no partial write, so mutations on the same path are serialized with
//! an in-process lock. Writers in other processes are not coordinated: the
//! last whole-collection write wins.

use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use super::{load_collection, Collection, CollectionError};
use crate::models::{decode, humanize, validate, DeletePolicy, Entity, Ordered};
use crate::store::{normalize_path, DocumentStore};

/// One async lock per store path, shared by every mutator of an `AppState`
#[derive(Clone, Default)]
pub struct PathLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `path`
    pub async fn acquire(&self, path: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(path.to_string()).or_default().clone();
        lock.lock_owned().await
    }
}

/// Outcome of a delete request
#[derive(Debug, Clone, PartialEq)]
pub enum Deletion<T> {
    /// The record is gone from the collection
    Removed(T),
    /// The record was kept and marked as removed
    Deactivated(T),
}

impl<T> Deletion<T> {
    /// The record as it was removed or deactivated
    pub fn into_inner(self) -> T {
        match self {
            Deletion::Removed(item) | Deletion::Deactivated(item) => item,
        }
    }

    /// True when the record stays in the collection
    pub fn is_soft(&self) -> bool {
        matches!(self, Deletion::Deactivated(_))
    }
}

/// Address of a record nested inside a parent entity, by wire field names.
///
/// `SubEntityTarget::new("tasks").within("roadmap", "phase-1").item("task-2")`
/// is task `task-2` in the `tasks` list of roadmap phase `phase-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubEntityTarget {
    ancestors: Vec<(String, String)>,
    field: String,
    id: Option<String>,
}

impl SubEntityTarget {
    /// Records in the parent's `field` list
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            ancestors: Vec::new(),
            field: field.into(),
            id: None,
        }
    }

    /// Descend into the `field` list record with `id` first
    pub fn within(mut self, field: impl Into<String>, id: impl Into<String>) -> Self {
        self.ancestors.push((field.into(), id.into()));
        self
    }

    /// Address one record of the list by id
    pub fn item(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubEntityChange {
    /// Append a record; an id is assigned when it has none
    Add(Value),
    /// Merge fields into the addressed record
    Patch(Map<String, Value>),
    /// Flip a boolean field of the addressed record
    Toggle(String),
    Remove,
}

/// Writes records of one collection, one whole-collection rewrite per change
pub struct EntityMutator<T> {
    store: Arc<dyn DocumentStore>,
    path: String,
    locks: PathLocks,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityMutator<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            path: self.path.clone(),
            locks: self.locks.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> EntityMutator<T> {
    /// Mutator for the entity's own collection
    pub fn new(store: Arc<dyn DocumentStore>, locks: PathLocks) -> Self {
        Self::at_path(store, T::COLLECTION, locks)
    }

    /// Mutator for a collection stored at a custom path
    pub fn at_path(store: Arc<dyn DocumentStore>, path: &str, locks: PathLocks) -> Self {
        Self {
            store,
            path: normalize_path(path),
            locks,
            _entity: PhantomData,
        }
    }

    /// Normalized store path being written
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Read the whole collection
    pub async fn load(&self) -> Result<Collection<T>, CollectionError> {
        load_collection(self.store.as_ref(), &self.path).await
    }

    /// One record, or `NotFound`
    pub async fn get(&self, id: &str) -> Result<T, CollectionError> {
        self.load()
            .await?
            .get(id)
            .cloned()
            .ok_or_else(|| CollectionError::not_found(T::KIND, id))
    }

    /// Validate `draft`, give it a fresh id and append it
    pub async fn add(&self, draft: T) -> Result<T, CollectionError> {
        let mut item = draft;
        item.normalize();
        validate(&item)?;

        let item = self
            .with_collection(|collection| {
                let id = new_id(|candidate| collection.contains_id(candidate));
                item.set_id(id);
                item.stamp(&now(), true);
                item.normalize();
                collection.push(item.clone());
                Ok(item)
            })
            .await?;

        info!(path = %self.path, id = %item.id(), "Added {}", T::KIND);
        Ok(item)
    }

    /// Merge the fields of `patch` into the record. Absent fields are kept.
    pub async fn update(&self, id: &str, patch: Value) -> Result<T, CollectionError> {
        let Value::Object(patch) = patch else {
            return Err(CollectionError::InvalidPatch(
                "patch must be a JSON object".to_string(),
            ));
        };
        if let Some(new_id) = patch.get("id") {
            if new_id.as_str() != Some(id) && !new_id.is_null() {
                return Err(CollectionError::InvalidPatch(
                    "id cannot be changed".to_string(),
                ));
            }
        }

        let item = self
            .with_collection(|collection| {
                let current = collection
                    .get_mut(id)
                    .ok_or_else(|| CollectionError::not_found(T::KIND, id))?;

                let mut merged = serde_json::to_value(&*current)?;
                if let Value::Object(fields) = &mut merged {
                    for (key, value) in patch {
                        if key != "id" {
                            fields.insert(key, value);
                        }
                    }
                }

                let mut updated: T = decode(merged)?;
                updated.set_id(id.to_string());
                finish(&mut updated)?;
                *current = updated.clone();
                Ok(updated)
            })
            .await?;

        info!(path = %self.path, id = %id, "Updated {}", T::KIND);
        Ok(item)
    }

    /// Apply a typed change to one record
    pub async fn modify<F>(&self, id: &str, change: F) -> Result<T, CollectionError>
    where
        F: FnOnce(&mut T) -> Result<(), CollectionError> + Send,
    {
        let item = self
            .with_collection(|collection| {
                let current = collection
                    .get_mut(id)
                    .ok_or_else(|| CollectionError::not_found(T::KIND, id))?;
                let mut updated = current.clone();
                change(&mut updated)?;
                updated.set_id(id.to_string());
                finish_change(current, &mut updated)?;
                *current = updated.clone();
                Ok(updated)
            })
            .await?;

        debug!(path = %self.path, id = %id, "Modified {}", T::KIND);
        Ok(item)
    }

    /// Remove the record, or mark it removed for soft-delete entities
    pub async fn delete(&self, id: &str) -> Result<Deletion<T>, CollectionError> {
        let deletion = self
            .with_collection(|collection| match T::DELETE_POLICY {
                DeletePolicy::Physical => collection
                    .remove(id)
                    .map(Deletion::Removed)
                    .ok_or_else(|| CollectionError::not_found(T::KIND, id)),
                DeletePolicy::Soft => {
                    let current = collection
                        .get_mut(id)
                        .ok_or_else(|| CollectionError::not_found(T::KIND, id))?;
                    current.soft_delete();
                    current.stamp(&now(), false);
                    current.normalize();
                    Ok(Deletion::Deactivated(current.clone()))
                }
            })
            .await?;

        info!(path = %self.path, id = %id, soft = deletion.is_soft(), "Deleted {}", T::KIND);
        Ok(deletion)
    }

    /// Add, patch, toggle or remove a record nested inside `parent_id`.
    /// Derived fields of the parent are recomputed before validation.
    pub async fn mutate_sub_entity(
        &self,
        parent_id: &str,
        target: &SubEntityTarget,
        change: SubEntityChange,
    ) -> Result<T, CollectionError> {
        let item = self
            .with_collection(|collection| {
                let current = collection
                    .get_mut(parent_id)
                    .ok_or_else(|| CollectionError::not_found(T::KIND, parent_id))?;

                let mut value = serde_json::to_value(&*current)?;
                apply_sub_change(&mut value, target, change)?;

                let mut updated: T = decode(value)?;
                updated.set_id(parent_id.to_string());
                finish_change(current, &mut updated)?;
                *current = updated.clone();
                Ok(updated)
            })
            .await?;

        info!(
            path = %self.path,
            id = %parent_id,
            field = %target.field,
            "Updated nested records of {}", T::KIND
        );
        Ok(item)
    }

    /// Lock the path, load, apply `f`, and write the collection back when
    /// `f` succeeds
    async fn with_collection<R, F>(&self, f: F) -> Result<R, CollectionError>
    where
        F: FnOnce(&mut Collection<T>) -> Result<R, CollectionError> + Send,
    {
        let _guard = self.locks.acquire(&self.path).await;
        let mut collection = self.load().await?;
        let result = f(&mut collection)?;
        let value = collection.to_value()?;
        self.store.write_path(&self.path, &value).await?;
        Ok(result)
    }
}

impl<T: Ordered> EntityMutator<T> {
    /// Move a record to `position` (0-based) in display order and renumber
    /// every record `1..=n`. Returns the records in their new order.
    pub async fn reorder(&self, id: &str, position: usize) -> Result<Vec<T>, CollectionError> {
        let items = self
            .with_collection(|collection| {
                let mut items = collection.items();
                items.sort_by_key(|item| item.order());

                let from = items
                    .iter()
                    .position(|item| item.id() == id)
                    .ok_or_else(|| CollectionError::not_found(T::KIND, id))?;
                let item = items.remove(from);
                let to = position.min(items.len());
                items.insert(to, item);

                for (i, item) in items.iter_mut().enumerate() {
                    let before = item.clone();
                    item.set_order(i as i64 + 1);
                    finish_change(&before, item)?;
                }
                collection.replace_items(items.clone());
                Ok(items)
            })
            .await?;

        info!(path = %self.path, id = %id, position, "Reordered {}", T::KIND);
        Ok(items)
    }

    /// Show or hide a record
    pub async fn toggle_active(&self, id: &str) -> Result<T, CollectionError> {
        self.modify(id, |item| {
            item.set_active(!item.is_active());
            Ok(())
        })
        .await
    }
}

/// Stamp, normalize and validate a record after a free-form edit
fn finish<T: Entity>(item: &mut T) -> Result<(), CollectionError> {
    item.stamp(&now(), false);
    item.normalize();
    validate(item)?;
    Ok(())
}

/// Stamp and normalize a record after a typed change. Only failures the
/// change introduced are reported, so a stored record with a blank required
/// field can still be toggled, reordered or moved along its workflow.
fn finish_change<T: Entity>(before: &T, item: &mut T) -> Result<(), CollectionError> {
    item.stamp(&now(), false);
    item.normalize();
    match (validate(item), validate(before)) {
        (Ok(()), _) => Ok(()),
        (Err(errors), Ok(())) => Err(errors.into()),
        (Err(errors), Err(known)) => Ok(errors.excluding(&known).finish()?),
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `{unix millis}-{8 hex chars}`, regenerated while `taken` reports a clash
pub fn new_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8]);
        if !taken(&id) {
            return id;
        }
    }
}

fn item_kind(field: &str) -> String {
    match field {
        "roadmap" => "Phase".to_string(),
        "tasks" => "Task".to_string(),
        "milestones" => "Milestone".to_string(),
        "teamMembers" => "Team member".to_string(),
        other => humanize(other),
    }
}

fn record_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

fn list_mut<'a>(node: &'a mut Value, field: &str) -> Result<&'a mut Vec<Value>, CollectionError> {
    let Value::Object(fields) = node else {
        return Err(CollectionError::InvalidPatch(format!(
            "cannot address `{}` on a non-object record",
            field
        )));
    };
    let list = fields
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if list.is_null() {
        *list = Value::Array(Vec::new());
    }
    list.as_array_mut()
        .ok_or_else(|| CollectionError::InvalidPatch(format!("`{}` is not a list", field)))
}

fn find_mut<'a>(
    items: &'a mut [Value],
    field: &str,
    id: &str,
) -> Result<&'a mut Value, CollectionError> {
    items
        .iter_mut()
        .find(|item| record_id(item) == Some(id))
        .ok_or_else(|| CollectionError::not_found(item_kind(field), id))
}

fn apply_sub_change(
    root: &mut Value,
    target: &SubEntityTarget,
    change: SubEntityChange,
) -> Result<(), CollectionError> {
    let mut node = root;
    for (field, id) in &target.ancestors {
        let items = list_mut(node, field)?;
        node = find_mut(items, field, id)?;
    }
    let items = list_mut(node, &target.field)?;

    let target_id = || {
        target.id.as_deref().ok_or_else(|| {
            CollectionError::InvalidPatch(format!(
                "no {} id given",
                item_kind(&target.field).to_lowercase()
            ))
        })
    };

    match change {
        SubEntityChange::Add(mut value) => {
            let Value::Object(fields) = &mut value else {
                return Err(CollectionError::InvalidPatch(format!(
                    "{} must be a JSON object",
                    item_kind(&target.field)
                )));
            };
            let has_id = fields
                .get("id")
                .and_then(Value::as_str)
                .map(|id| !id.is_empty())
                .unwrap_or(false);
            if !has_id {
                let id = new_id(|candidate| items.iter().any(|item| record_id(item) == Some(candidate)));
                fields.insert("id".to_string(), Value::String(id));
            }
            items.push(value);
        }
        SubEntityChange::Patch(patch) => {
            let id = target_id()?;
            let Value::Object(fields) = find_mut(items, &target.field, id)? else {
                return Err(CollectionError::InvalidPatch(format!(
                    "{} {} is not an object",
                    item_kind(&target.field),
                    id
                )));
            };
            for (key, value) in patch {
                if key != "id" {
                    fields.insert(key, value);
                }
            }
        }
        SubEntityChange::Toggle(flag) => {
            let id = target_id()?;
            let item = find_mut(items, &target.field, id)?;
            let current = item.get(&flag).and_then(Value::as_bool).unwrap_or(false);
            if let Value::Object(fields) = item {
                fields.insert(flag, Value::Bool(!current));
            }
        }
        SubEntityChange::Remove => {
            let id = target_id()?;
            let index = items
                .iter()
                .position(|item| record_id(item) == Some(id))
                .ok_or_else(|| CollectionError::not_found(item_kind(&target.field), id))?;
            items.remove(index);
        }
    }
    Ok(())
}

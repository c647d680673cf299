//! Draft state behind the create and edit dialogs.
//!
//! A form holds the entity as loose JSON so that half-filled input can be
//! kept around while the user edits it. Nothing is decoded into the typed
//! record until [`FormState::validate`] or [`FormState::submit`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::collection::{CollectionError, EntityMutator};
use crate::models::{de, decode, validate, Entity};
use crate::validation::FieldErrors;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    /// Editing the record with this id
    Edit(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    fn from_result(result: Result<(), FieldErrors>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                errors: BTreeMap::new(),
            },
            Err(errors) => Self {
                valid: false,
                errors: errors.into_map(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormState<T> {
    mode: FormMode,
    draft: Map<String, Value>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> FormState<T> {
    /// Empty form seeded with the entity's defaults
    pub fn create() -> Self {
        let mut draft = to_object(&T::default());
        draft.remove("id");
        Self {
            mode: FormMode::Create,
            draft,
            _entity: PhantomData,
        }
    }

    /// Form seeded with the selected record
    pub fn edit(entity: &T) -> Self {
        Self {
            mode: FormMode::Edit(entity.id().to_string()),
            draft: to_object(entity),
            _entity: PhantomData,
        }
    }

    /// Whether submit creates or edits
    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    /// Current field values, by wire name
    pub fn draft(&self) -> &Map<String, Value> {
        &self.draft
    }

    /// One draft value
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.draft.get(key)
    }

    /// Set one draft value. The id cannot be edited.
    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        if key == "id" {
            return;
        }
        self.draft.insert(key.to_string(), value.into());
    }

    /// Set every field of `fields`, as when a whole form body is posted
    pub fn apply(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            self.set_field(&key, value);
        }
    }

    /// Set a string-list field from comma-separated input (`"a, b,,c"`)
    pub fn set_array_field(&mut self, key: &str, input: &str) {
        let items = de::split_comma_list(input)
            .into_iter()
            .map(Value::String)
            .collect();
        self.set_field(key, Value::Array(items));
    }

    /// Append `template` to a sub-list and return its index
    pub fn add_list_item(&mut self, list_key: &str, template: Value) -> usize {
        self.with_list(list_key, |list| {
            list.push(template);
            list.len() - 1
        })
    }

    /// Remove the item at `index` from a list field
    pub fn remove_list_item(&mut self, list_key: &str, index: usize) -> Option<Value> {
        self.with_list(list_key, |list| {
            if index < list.len() {
                Some(list.remove(index))
            } else {
                None
            }
        })
    }

    /// Set one field of a sub-list item (a milestone name, a task title)
    pub fn set_list_item_field(
        &mut self,
        list_key: &str,
        index: usize,
        key: &str,
        value: impl Into<Value>,
    ) -> bool {
        self.with_list(list_key, |list| match list.get_mut(index) {
            Some(Value::Object(item)) => {
                item.insert(key.to_string(), value.into());
                true
            }
            _ => false,
        })
    }

    /// Run `f` on a sub-list, replacing a missing or non-list value with `[]`
    fn with_list<R>(&mut self, list_key: &str, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let slot = self
            .draft
            .entry(list_key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = slot {
            return f(items);
        }
        let mut items = Vec::new();
        let result = f(&mut items);
        *slot = Value::Array(items);
        result
    }

    /// Decode and check the draft without touching the store
    pub fn validate(&self) -> ValidationReport {
        ValidationReport::from_result(self.decode().map(|_| ()))
    }

    /// Validate, then create or update through `mutator`. An invalid draft
    /// never reaches the mutator.
    pub async fn submit(&self, mutator: &EntityMutator<T>) -> Result<T, CollectionError> {
        let entity = self.decode().map_err(CollectionError::ValidationFailed)?;
        match &self.mode {
            FormMode::Create => mutator.add(entity).await,
            FormMode::Edit(id) => mutator.update(id, Value::Object(self.draft.clone())).await,
        }
    }

    fn decode(&self) -> Result<T, FieldErrors> {
        let entity: T = decode(Value::Object(self.draft.clone()))?;
        validate(&entity)?;
        Ok(entity)
    }
}

fn to_object<T: Entity>(entity: &T) -> Map<String, Value> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::PathLocks;
    use crate::models::{Milestone, Project, Service, Ticket};
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_create_seeds_defaults() {
        let form = FormState::<Ticket>::create();
        assert_eq!(form.mode(), &FormMode::Create);
        assert_eq!(form.field("status"), Some(&json!("open")));
        assert_eq!(form.field("priority"), Some(&json!("medium")));
        assert!(form.field("id").is_none());
    }

    #[test]
    fn test_validation_reports_required_fields() {
        let mut form = FormState::<Ticket>::create();
        form.set_field("title", "Broken login");
        form.set_field("description", "Users cannot sign in");

        let report = form.validate();
        assert!(!report.valid);
        assert_eq!(report.errors["category"], vec!["Category is required"]);
        assert_eq!(report.errors.len(), 1);

        form.set_field("category", "bug");
        assert!(form.validate().valid);
    }

    #[test]
    fn test_validation_reports_enum_and_email() {
        let mut form = FormState::<Ticket>::create();
        form.apply(
            json!({
                "title": "T", "description": "D", "category": "c",
                "priority": "urgent", "assigneeEmail": "nope"
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        let report = form.validate();
        assert!(report.errors.contains_key("priority"));

        form.set_field("priority", "high");
        let report = form.validate();
        assert!(report.errors.contains_key("assigneeEmail"));
    }

    #[test]
    fn test_array_field_and_list_items() {
        let mut form = FormState::<Project>::create();
        form.set_array_field("technologies", "rust, axum,, ,serde");
        assert_eq!(form.field("technologies"), Some(&json!(["rust", "axum", "serde"])));

        let template = serde_json::to_value(Milestone::default()).unwrap();
        let first = form.add_list_item("milestones", template.clone());
        let second = form.add_list_item("milestones", template);
        assert_eq!((first, second), (0, 1));
        assert!(form.set_list_item_field("milestones", 1, "name", "Launch"));

        form.apply(
            json!({"name": "Relaunch", "description": "D", "deadline": "2026-12-01", "lead": "Ama"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let report = form.validate();
        assert_eq!(report.errors.keys().collect::<Vec<_>>(), ["milestones[0].name"]);

        assert!(form.remove_list_item("milestones", 0).is_some());
        assert!(form.remove_list_item("milestones", 5).is_none());
        assert!(form.validate().valid);
    }

    #[tokio::test]
    async fn test_invalid_submit_never_reaches_store() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let mutator = EntityMutator::<Ticket>::new(store.clone(), PathLocks::new());

        let mut form = FormState::<Ticket>::create();
        form.set_field("title", "No category");
        form.set_field("description", "D");
        let err = form.submit(&mutator).await.unwrap_err();
        match err {
            CollectionError::ValidationFailed(errors) => assert!(errors.get("category").is_some()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_submit_create_then_edit() {
        let store = Arc::new(MemoryStore::new());
        let mutator = EntityMutator::<Service>::new(store.clone(), PathLocks::new());

        let mut form = FormState::<Service>::create();
        form.set_field("title", "Branding");
        form.set_field("description", "Logos and identity");
        form.set_array_field("features", "logo, palette");
        let created = form.submit(&mutator).await.unwrap();
        assert!(!created.id.is_empty());

        let mut edit = FormState::edit(&created);
        assert_eq!(edit.mode(), &FormMode::Edit(created.id.clone()));
        edit.set_field("price", "from $900");
        let updated = edit.submit(&mutator).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.price, "from $900");
        assert_eq!(updated.features, vec!["logo", "palette"]);

        let raw = store.read_path("services").await.unwrap().unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 1);
    }
}

//! Typed records for every collection the dashboard manages.
//!
//! Remote records are loosely shaped, so each model decodes leniently (see
//! [`de`]) and then runs [`Entity::normalize`] to fill defaults and recompute
//! derived fields. Status, priority and role values are closed enums: an
//! out-of-set value fails decoding instead of being carried as free text.

pub mod catalog;
pub mod client_project;
pub mod de;
pub mod project;
pub mod staff;
pub mod ticket;

pub use catalog::{PortfolioProject, PricingPackage, Service};
pub use client_project::{ClientProject, ClientProjectStatus, PhaseStatus, RoadmapPhase, RoadmapTask, TeamMember};
pub use project::{Milestone, MilestoneStatus, Project, ProjectStatus};
pub use staff::{StaffMember, StaffRole, StaffStatus};
pub use ticket::{Ticket, TicketStatus};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::validation::FieldErrors;

/// How a delete request is carried out for an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// The record is removed from the collection
    Physical,
    /// The record stays in the collection and is marked as removed
    Soft,
}

/// A record that lives in a named collection of the document store.
pub trait Entity:
    Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static
{
    /// Human-readable type name used in errors and logs
    const KIND: &'static str;
    /// Store path of the collection
    const COLLECTION: &'static str;
    /// String fields that must be non-empty (wire names)
    const REQUIRED_FIELDS: &'static [&'static str];
    const DELETE_POLICY: DeletePolicy = DeletePolicy::Physical;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Fill defaults and recompute derived fields. Must be idempotent.
    fn normalize(&mut self) {}

    /// Typed checks beyond required fields (ranges, nested records, formats)
    fn check(&self, _errors: &mut FieldErrors) {}

    /// Apply the soft-delete mutation. Only called for `DeletePolicy::Soft`.
    fn soft_delete(&mut self) {}

    /// Record creation/update timestamps (RFC 3339) where the entity has them
    fn stamp(&mut self, _now: &str, _created: bool) {}
}

/// Entities with a display order and a visibility flag (website content)
pub trait Ordered: Entity {
    fn order(&self) -> i64;
    fn set_order(&mut self, order: i64);
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
}

/// Priority scale shared by tickets, projects, phases and tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage of `done` out of `total`, rounded to the nearest integer.
/// Returns 0 for an empty set and never reports 100 while work remains.
pub fn completion_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    if done >= total {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round().min(99.0) as u8
}

/// Give every nested record without an id a deterministic one
/// (`{prefix}-{position}`), so repeated normalization yields the same ids.
pub(crate) fn fill_missing_ids<T>(items: &mut [T], id: impl Fn(&mut T) -> &mut String, prefix: &str) {
    let mut taken: std::collections::HashSet<String> = items
        .iter_mut()
        .map(|item| id(item).clone())
        .filter(|s| !s.is_empty())
        .collect();
    for (i, item) in items.iter_mut().enumerate() {
        let slot = id(item);
        if !slot.is_empty() {
            continue;
        }
        let mut candidate = format!("{}-{}", prefix, i + 1);
        let mut n = 1;
        while taken.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{}-{}", prefix, i + 1, n);
        }
        taken.insert(candidate.clone());
        *slot = candidate;
    }
}

/// Decode a record from its JSON form and normalize it.
///
/// On failure each top-level field is tried on its own against a default
/// record, so the error names the field holding the bad value.
pub fn decode<T: Entity>(value: serde_json::Value) -> Result<T, FieldErrors> {
    let err = match serde_json::from_value::<T>(value.clone()) {
        Ok(mut entity) => {
            entity.normalize();
            return Ok(entity);
        }
        Err(e) => e,
    };

    let mut errors = FieldErrors::new();
    let base = serde_json::to_value(T::default()).unwrap_or_default();
    match (&value, base) {
        (serde_json::Value::Object(fields), serde_json::Value::Object(base)) => {
            for (key, field_value) in fields {
                let mut candidate = base.clone();
                candidate.insert(key.clone(), field_value.clone());
                if let Err(e) = serde_json::from_value::<T>(serde_json::Value::Object(candidate)) {
                    errors.add(key.clone(), format!("Invalid {}: {}", humanize(key).to_lowercase(), e));
                }
            }
        }
        (serde_json::Value::Object(_), _) => {}
        _ => {
            errors.add("record", format!("{} must be a JSON object", T::KIND));
        }
    }
    if errors.is_empty() {
        errors.add("record", err.to_string());
    }
    Err(errors)
}

/// Required-field and typed checks for a normalized record
pub fn validate<T: Entity>(entity: &T) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    match serde_json::to_value(entity) {
        Ok(value) => check_required(&value, T::REQUIRED_FIELDS, &mut errors),
        Err(e) => {
            errors.add("record", e.to_string());
        }
    }
    entity.check(&mut errors);
    errors.finish()
}

/// Record an error for every listed field that is missing or blank
pub(crate) fn check_required(value: &serde_json::Value, fields: &[&str], errors: &mut FieldErrors) {
    for field in fields {
        let present = value
            .get(*field)
            .and_then(|v| v.as_str())
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if !present {
            errors.add(*field, format!("{} is required", humanize(field)));
        }
    }
}

/// `estimatedHours` -> `Estimated hours`
pub(crate) fn humanize(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

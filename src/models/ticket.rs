//! Support and work tickets (`staffdashboard/tickets`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{de, Entity, Priority};
use crate::validation::{validate_email, validate_optional_date, FieldErrors};

/// Ticket lifecycle. The last three values come from the task board, which
/// shares this collection with the support queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Review,
    Closed,
    Planning,
    Available,
    Completed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 7] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Review,
        TicketStatus::Closed,
        TicketStatus::Planning,
        TicketStatus::Available,
        TicketStatus::Completed,
    ];

    /// Closed and completed tickets need no further work
    pub fn is_resolved(&self) -> bool {
        matches!(self, TicketStatus::Closed | TicketStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in-progress",
            TicketStatus::Review => "review",
            TicketStatus::Closed => "closed",
            TicketStatus::Planning => "planning",
            TicketStatus::Available => "available",
            TicketStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub title: String,
    #[serde(default, deserialize_with = "de::string")]
    pub description: String,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "de::string")]
    pub assignee: String,
    #[serde(default, deserialize_with = "de::string")]
    pub assignee_email: String,
    #[serde(default, deserialize_with = "de::string")]
    pub reporter: String,
    #[serde(default, deserialize_with = "de::string")]
    pub created: String,
    #[serde(default, deserialize_with = "de::string")]
    pub updated: String,
    #[serde(default, deserialize_with = "de::string")]
    pub due_date: String,
    #[serde(default, deserialize_with = "de::number")]
    pub estimated_hours: f64,
    #[serde(default, deserialize_with = "de::string")]
    pub category: String,
    /// Project referenced by name
    #[serde(default, deserialize_with = "de::string")]
    pub project: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Ticket {
    /// Due date in the past while the ticket is still unresolved
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.status.is_resolved() {
            return false;
        }
        parse_day(&self.due_date)
            .map(|due| due < today)
            .unwrap_or(false)
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp
pub(crate) fn parse_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

impl Entity for Ticket {
    const KIND: &'static str = "Ticket";
    const COLLECTION: &'static str = "staffdashboard/tickets";
    const REQUIRED_FIELDS: &'static [&'static str] = &["title", "description", "category"];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn normalize(&mut self) {
        self.estimated_hours = self.estimated_hours.max(0.0);
        self.assignee_email = self.assignee_email.trim().to_lowercase();
    }

    fn check(&self, errors: &mut FieldErrors) {
        if !self.assignee_email.is_empty() {
            if let Err(e) = validate_email(&self.assignee_email) {
                errors.add("assigneeEmail", e);
            }
        }
        if let Err(e) = validate_optional_date(&self.due_date) {
            errors.add("dueDate", e);
        }
    }

    fn stamp(&mut self, now: &str, created: bool) {
        if created && self.created.is_empty() {
            self.created = now.to_string();
        }
        self.updated = now.to_string();
    }
}

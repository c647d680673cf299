//! Internal delivery projects (`staffdashboard/projects`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{completion_percent, de, fill_missing_ids, Entity, Priority};
use crate::validation::{validate_optional_date, FieldErrors};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 5] = [
        ProjectStatus::Planning,
        ProjectStatus::Active,
        ProjectStatus::OnHold,
        ProjectStatus::Completed,
        ProjectStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on-hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub name: String,
    #[serde(default)]
    pub status: MilestoneStatus,
    #[serde(default, deserialize_with = "de::string")]
    pub date: String,
    /// Done flag of older records. Read once by `normalize` and never
    /// written back, so `status` stays the only source of truth.
    #[serde(default, deserialize_with = "de::flag", skip_serializing)]
    pub completed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Milestone {
    pub fn is_completed(&self) -> bool {
        self.status == MilestoneStatus::Completed
    }

    /// The legacy flag only upgrades a milestone that has not started
    fn normalize(&mut self) {
        if self.completed && self.status == MilestoneStatus::Pending {
            self.status = MilestoneStatus::Completed;
        }
        self.completed = false;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub name: String,
    #[serde(default, deserialize_with = "de::string")]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub priority: Priority,
    /// Derived from milestones when there are any
    #[serde(default, deserialize_with = "de::percent")]
    pub progress: u8,
    #[serde(default, deserialize_with = "de::string")]
    pub start_date: String,
    #[serde(default, deserialize_with = "de::string")]
    pub deadline: String,
    /// Free text ("$12k", "TBD")
    #[serde(default, deserialize_with = "de::string")]
    pub budget: String,
    #[serde(default, deserialize_with = "de::count")]
    pub team_size: u32,
    #[serde(default, deserialize_with = "de::string")]
    pub lead: String,
    #[serde(default, deserialize_with = "de::string_list")]
    pub technologies: Vec<String>,
    #[serde(default, deserialize_with = "de::record_list")]
    pub milestones: Vec<Milestone>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    /// Milestones whose status is completed
    pub fn completed_milestones(&self) -> usize {
        self.milestones.iter().filter(|m| m.is_completed()).count()
    }
}

impl Entity for Project {
    const KIND: &'static str = "Project";
    const COLLECTION: &'static str = "staffdashboard/projects";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "description", "deadline", "lead"];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn normalize(&mut self) {
        fill_missing_ids(&mut self.milestones, |m| &mut m.id, "milestone");
        for milestone in &mut self.milestones {
            milestone.normalize();
        }
        if !self.milestones.is_empty() {
            self.progress = completion_percent(self.completed_milestones(), self.milestones.len());
        }
    }

    fn check(&self, errors: &mut FieldErrors) {
        if let Err(e) = validate_optional_date(&self.deadline) {
            errors.add("deadline", e);
        }
        if let Err(e) = validate_optional_date(&self.start_date) {
            errors.add("startDate", e);
        }
        for (i, milestone) in self.milestones.iter().enumerate() {
            errors.require(format!("milestones[{}].name", i), &milestone.name);
        }
    }
}

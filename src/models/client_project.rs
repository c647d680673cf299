//! Client-facing projects with their delivery roadmap (`clientProjects`).
//!
//! Progress, status, phase colors and the next milestone are all derived
//! from the roadmap, so every roadmap edit must go through
//! [`Entity::normalize`] before the record is written back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{completion_percent, de, fill_missing_ids, Entity, Priority};
use crate::validation::{validate_email, validate_optional_date, FieldErrors};

/// Delivery status of a client project, derived from its progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientProjectStatus {
    #[default]
    Planning,
    InProgress,
    Completed,
}

impl ClientProjectStatus {
    /// 0 is planning, 100 is completed, anything between is in progress
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0 => ClientProjectStatus::Planning,
            100..=u8::MAX => ClientProjectStatus::Completed,
            _ => ClientProjectStatus::InProgress,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    Completed,
    InProgress,
    #[default]
    Upcoming,
}

impl PhaseStatus {
    /// Badge color shown by the dashboard
    pub fn color(&self) -> &'static str {
        match self {
            PhaseStatus::Completed => "#10b981",
            PhaseStatus::InProgress => "#3b82f6",
            PhaseStatus::Upcoming => "#6b7280",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapTask {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub title: String,
    #[serde(default, deserialize_with = "de::string")]
    pub description: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    /// Free text ("2 days", "4h")
    #[serde(default, deserialize_with = "de::string")]
    pub estimated_time: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapPhase {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub title: String,
    #[serde(default, deserialize_with = "de::string")]
    pub description: String,
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default, deserialize_with = "de::string")]
    pub category: String,
    /// Derived from `status`; whatever was stored is overwritten
    #[serde(default, deserialize_with = "de::string")]
    pub color: String,
    #[serde(default)]
    pub priority: Priority,
    /// Percentage of completed tasks
    #[serde(default, deserialize_with = "de::percent")]
    pub completion: u8,
    #[serde(default, deserialize_with = "de::record_list")]
    pub tasks: Vec<RoadmapTask>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoadmapPhase {
    /// Tasks of this phase marked done
    pub fn completed_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    fn normalize(&mut self) {
        fill_missing_ids(&mut self.tasks, |t| &mut t.id, "task");

        let done = self.completed_tasks();
        let total = self.tasks.len();
        self.completion = completion_percent(done, total);

        if total > 0 {
            self.status = if done == total {
                PhaseStatus::Completed
            } else if done > 0 {
                PhaseStatus::InProgress
            } else if self.status == PhaseStatus::Completed {
                PhaseStatus::Upcoming
            } else {
                self.status
            };
        }

        self.color = self.status.color().to_string();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub name: String,
    #[serde(default, deserialize_with = "de::string")]
    pub role: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProject {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    /// Identifies the client account that owns the project
    #[serde(default, deserialize_with = "de::string")]
    pub email: String,
    #[serde(default, deserialize_with = "de::string")]
    pub name: String,
    #[serde(default, deserialize_with = "de::string")]
    pub description: String,
    #[serde(default, deserialize_with = "de::number")]
    pub budget: f64,
    #[serde(default, deserialize_with = "de::string")]
    pub due_date: String,
    #[serde(default, deserialize_with = "de::string")]
    pub next_milestone: String,
    #[serde(default, deserialize_with = "de::percent")]
    pub progress: u8,
    #[serde(default)]
    pub status: ClientProjectStatus,
    #[serde(default, deserialize_with = "de::record_list")]
    pub team_members: Vec<TeamMember>,
    #[serde(default, deserialize_with = "de::string_list")]
    pub technologies: Vec<String>,
    #[serde(default, deserialize_with = "de::record_list")]
    pub roadmap: Vec<RoadmapPhase>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClientProject {
    /// (completed, total) tasks across every phase
    pub fn task_counts(&self) -> (usize, usize) {
        self.roadmap.iter().fold((0, 0), |(done, total), phase| {
            (done + phase.completed_tasks(), total + phase.tasks.len())
        })
    }

    /// Roadmap phase with this id
    pub fn phase(&self, phase_id: &str) -> Option<&RoadmapPhase> {
        self.roadmap.iter().find(|p| p.id == phase_id)
    }
}

impl Entity for ClientProject {
    const KIND: &'static str = "Client project";
    const COLLECTION: &'static str = "clientProjects";
    const REQUIRED_FIELDS: &'static [&'static str] = &["email", "name", "description"];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn normalize(&mut self) {
        self.email = self.email.trim().to_lowercase();
        self.budget = self.budget.max(0.0);

        fill_missing_ids(&mut self.team_members, |m| &mut m.id, "member");
        fill_missing_ids(&mut self.roadmap, |p| &mut p.id, "phase");
        for phase in &mut self.roadmap {
            phase.normalize();
        }

        let (done, total) = self.task_counts();
        if total > 0 {
            self.progress = completion_percent(done, total);
        } else if !self.roadmap.is_empty() {
            let finished = self
                .roadmap
                .iter()
                .filter(|p| p.status == PhaseStatus::Completed)
                .count();
            self.progress = completion_percent(finished, self.roadmap.len());
        }
        self.status = ClientProjectStatus::from_progress(self.progress);

        if !self.roadmap.is_empty() {
            self.next_milestone = self
                .roadmap
                .iter()
                .find(|p| p.status != PhaseStatus::Completed)
                .map(|p| p.title.clone())
                .unwrap_or_default();
        }
    }

    fn check(&self, errors: &mut FieldErrors) {
        if !self.email.is_empty() {
            if let Err(e) = validate_email(&self.email) {
                errors.add("email", e);
            }
        }
        if let Err(e) = validate_optional_date(&self.due_date) {
            errors.add("dueDate", e);
        }
        for (i, phase) in self.roadmap.iter().enumerate() {
            errors.require(format!("roadmap[{}].title", i), &phase.title);
            for (j, task) in phase.tasks.iter().enumerate() {
                errors.require(format!("roadmap[{}].tasks[{}].title", i, j), &task.title);
            }
        }
        for (i, member) in self.team_members.iter().enumerate() {
            errors.require(format!("teamMembers[{}].name", i), &member.name);
        }
    }
}

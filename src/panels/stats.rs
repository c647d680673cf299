//! Panel aggregates, recomputed from the current list on every change.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{
    ClientProject, ClientProjectStatus, PortfolioProject, PricingPackage, Priority, Project,
    ProjectStatus, Service, StaffMember, StaffStatus, Ticket, TicketStatus,
};
use crate::models::{completion_percent, Ordered};

/// Aggregates shown at the top of a panel
pub trait PanelStats: Sized {
    type Stats: Serialize + Send;

    fn summarize(items: &[Self]) -> Self::Stats;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffStats {
    pub total: usize,
    pub active: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub by_department: BTreeMap<String, usize>,
    /// Mean workload of active members, in percent
    pub average_workload: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total: usize,
    pub open: usize,
    pub overdue: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub by_priority: BTreeMap<&'static str, usize>,
    pub total_estimated_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub average_progress: f64,
    /// Share of projects marked completed, in percent
    pub completion_rate: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProjectStats {
    pub total: usize,
    pub completed: usize,
    pub total_budget: f64,
    pub average_progress: f64,
    pub tasks_completed: usize,
    pub tasks_total: usize,
    pub task_completion: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total: usize,
    pub active: usize,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        round1(sum / count as f64)
    }
}

fn tally<K: Copy>(keys: &[K], values: impl Iterator<Item = K>, name: impl Fn(K) -> &'static str) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> = keys.iter().map(|k| (name(*k), 0)).collect();
    for value in values {
        *counts.entry(name(value)).or_default() += 1;
    }
    counts
}

/// Headcount by status and department, and average workload
pub fn staff_stats(staff: &[StaffMember]) -> StaffStats {
    let mut by_department: BTreeMap<String, usize> = BTreeMap::new();
    for member in staff.iter().filter(|m| m.is_active()) {
        let department = if member.department.trim().is_empty() {
            "Unassigned".to_string()
        } else {
            member.department.trim().to_string()
        };
        *by_department.entry(department).or_default() += 1;
    }

    StaffStats {
        total: staff.len(),
        active: staff.iter().filter(|m| m.is_active()).count(),
        by_status: tally(&StaffStatus::ALL, staff.iter().map(|m| m.status), |s| s.as_str()),
        by_department,
        average_workload: mean(
            staff
                .iter()
                .filter(|m| m.is_active())
                .map(|m| f64::from(m.workload)),
        ),
    }
}

/// Ticket counts by status and priority; overdue is relative to `today`
pub fn ticket_stats(tickets: &[Ticket], today: NaiveDate) -> TicketStats {
    TicketStats {
        total: tickets.len(),
        open: tickets.iter().filter(|t| !t.status.is_resolved()).count(),
        overdue: tickets.iter().filter(|t| t.is_overdue(today)).count(),
        by_status: tally(&TicketStatus::ALL, tickets.iter().map(|t| t.status), |s| s.as_str()),
        by_priority: tally(&Priority::ALL, tickets.iter().map(|t| t.priority), |p| p.as_str()),
        total_estimated_hours: round1(tickets.iter().map(|t| t.estimated_hours).sum()),
    }
}

/// Status breakdown, average progress and share of completed projects
pub fn project_stats(projects: &[Project]) -> ProjectStats {
    let completed = projects
        .iter()
        .filter(|p| p.status == ProjectStatus::Completed)
        .count();
    ProjectStats {
        total: projects.len(),
        by_status: tally(&ProjectStatus::ALL, projects.iter().map(|p| p.status), |s| s.as_str()),
        average_progress: mean(projects.iter().map(|p| f64::from(p.progress))),
        completion_rate: completion_percent(completed, projects.len()),
    }
}

/// Budget, progress and task completion across client projects
pub fn client_project_stats(projects: &[ClientProject]) -> ClientProjectStats {
    let (tasks_completed, tasks_total) = projects.iter().fold((0, 0), |(done, total), p| {
        let (d, t) = p.task_counts();
        (done + d, total + t)
    });
    ClientProjectStats {
        total: projects.len(),
        completed: projects
            .iter()
            .filter(|p| p.status == ClientProjectStatus::Completed)
            .count(),
        total_budget: projects.iter().map(|p| p.budget).sum(),
        average_progress: mean(projects.iter().map(|p| f64::from(p.progress))),
        tasks_completed,
        tasks_total,
        task_completion: completion_percent(tasks_completed, tasks_total),
    }
}

/// Total and visible entries
pub fn catalog_stats<T: Ordered>(items: &[T]) -> CatalogStats {
    CatalogStats {
        total: items.len(),
        active: items.iter().filter(|i| i.is_active()).count(),
    }
}

impl PanelStats for StaffMember {
    type Stats = StaffStats;

    fn summarize(items: &[Self]) -> StaffStats {
        staff_stats(items)
    }
}

impl PanelStats for Ticket {
    type Stats = TicketStats;

    fn summarize(items: &[Self]) -> TicketStats {
        ticket_stats(items, Utc::now().date_naive())
    }
}

impl PanelStats for Project {
    type Stats = ProjectStats;

    fn summarize(items: &[Self]) -> ProjectStats {
        project_stats(items)
    }
}

impl PanelStats for ClientProject {
    type Stats = ClientProjectStats;

    fn summarize(items: &[Self]) -> ClientProjectStats {
        client_project_stats(items)
    }
}

macro_rules! catalog_panel_stats {
    ($($ty:ty),*) => {
        $(
            impl PanelStats for $ty {
                type Stats = CatalogStats;

                fn summarize(items: &[Self]) -> CatalogStats {
                    catalog_stats(items)
                }
            }
        )*
    };
}

catalog_panel_stats!(Service, PricingPackage, PortfolioProject);

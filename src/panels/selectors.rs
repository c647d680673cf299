//! Typed filters used by the panels and the API list endpoints.

use crate::models::{Ordered, Project, ProjectStatus, StaffMember, Ticket};

/// Members whose status is active
pub fn active_staff(staff: &[StaffMember]) -> Vec<&StaffMember> {
    staff.iter().filter(|m| m.is_active()).collect()
}

/// Tickets assigned to `assignee`, matched by name or email, ignoring case
pub fn tickets_by_assignee<'a>(tickets: &'a [Ticket], assignee: &str) -> Vec<&'a Ticket> {
    let needle = assignee.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    tickets
        .iter()
        .filter(|t| t.assignee.trim().to_lowercase() == needle || t.assignee_email == needle)
        .collect()
}

/// Projects with the given status
pub fn projects_by_status(projects: &[Project], status: ProjectStatus) -> Vec<&Project> {
    projects.iter().filter(|p| p.status == status).collect()
}

/// Visible catalog entries in display order. Ties keep storage order.
pub fn active_in_display_order<T: Ordered>(items: &[T]) -> Vec<&T> {
    let mut visible: Vec<&T> = items.iter().filter(|i| i.is_active()).collect();
    visible.sort_by_key(|i| i.order());
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PricingPackage, StaffStatus};

    #[test]
    fn test_tickets_by_assignee() {
        let tickets = vec![
            Ticket {
                id: "1".into(),
                assignee: "Kofi Mensah".into(),
                ..Default::default()
            },
            Ticket {
                id: "2".into(),
                assignee_email: "esi@agency.test".into(),
                ..Default::default()
            },
        ];
        let ids = |found: Vec<&Ticket>| found.iter().map(|t| t.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(tickets_by_assignee(&tickets, "kofi mensah")), ["1"]);
        assert_eq!(ids(tickets_by_assignee(&tickets, "ESI@agency.test")), ["2"]);
        assert!(tickets_by_assignee(&tickets, " ").is_empty());
    }

    #[test]
    fn test_active_staff_and_projects() {
        let staff = vec![
            StaffMember::default(),
            StaffMember {
                status: StaffStatus::Inactive,
                ..Default::default()
            },
        ];
        assert_eq!(active_staff(&staff).len(), 1);

        let projects = vec![
            Project {
                status: ProjectStatus::OnHold,
                ..Default::default()
            },
            Project::default(),
        ];
        assert_eq!(projects_by_status(&projects, ProjectStatus::OnHold).len(), 1);
    }

    #[test]
    fn test_active_in_display_order() {
        let package = |id: &str, order: i64, active: bool| PricingPackage {
            id: id.to_string(),
            order,
            is_active: active,
            ..Default::default()
        };
        let packages = vec![package("pro", 2, true), package("old", 0, false), package("starter", 1, true)];
        let visible: Vec<&str> = active_in_display_order(&packages)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(visible, ["starter", "pro"]);
    }
}

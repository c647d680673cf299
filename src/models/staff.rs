//! Staff member records (`users` collection).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{de, DeletePolicy, Entity};
use crate::validation::{validate_email, FieldErrors};

/// Staff roles ordered along the promotion ladder.
///
/// `Fired` sits outside the ladder: it is only reached through a soft delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Intern,
    Junior,
    #[default]
    Staff,
    Senior,
    Lead,
    Manager,
    Admin,
    Fired,
}

impl StaffRole {
    const LADDER: [StaffRole; 7] = [
        StaffRole::Intern,
        StaffRole::Junior,
        StaffRole::Staff,
        StaffRole::Senior,
        StaffRole::Lead,
        StaffRole::Manager,
        StaffRole::Admin,
    ];

    fn rung(&self) -> Option<usize> {
        Self::LADDER.iter().position(|r| r == self)
    }

    /// The next role up the ladder, if any
    pub fn promoted(&self) -> Option<StaffRole> {
        self.rung().and_then(|i| Self::LADDER.get(i + 1).copied())
    }

    /// The next role down the ladder, if any
    pub fn demoted(&self) -> Option<StaffRole> {
        self.rung()
            .and_then(|i| i.checked_sub(1))
            .map(|i| Self::LADDER[i])
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Intern => "intern",
            StaffRole::Junior => "junior",
            StaffRole::Staff => "staff",
            StaffRole::Senior => "senior",
            StaffRole::Lead => "lead",
            StaffRole::Manager => "manager",
            StaffRole::Admin => "admin",
            StaffRole::Fired => "fired",
        }
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "intern" => Ok(StaffRole::Intern),
            "junior" => Ok(StaffRole::Junior),
            "staff" => Ok(StaffRole::Staff),
            "senior" => Ok(StaffRole::Senior),
            "lead" => Ok(StaffRole::Lead),
            "manager" => Ok(StaffRole::Manager),
            "admin" => Ok(StaffRole::Admin),
            "fired" => Ok(StaffRole::Fired),
            _ => Err(format!("Unknown staff role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaffStatus {
    #[default]
    Active,
    Inactive,
    OnLeave,
}

impl StaffStatus {
    pub const ALL: [StaffStatus; 3] = [
        StaffStatus::Active,
        StaffStatus::Inactive,
        StaffStatus::OnLeave,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffStatus::Active => "active",
            StaffStatus::Inactive => "inactive",
            StaffStatus::OnLeave => "on-leave",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub name: String,
    #[serde(default, deserialize_with = "de::string")]
    pub email: String,
    #[serde(default)]
    pub role: StaffRole,
    #[serde(default, deserialize_with = "de::string")]
    pub department: String,
    #[serde(default)]
    pub status: StaffStatus,
    #[serde(default, deserialize_with = "de::string")]
    pub join_date: String,
    #[serde(default, deserialize_with = "de::string_list")]
    pub skills: Vec<String>,
    /// Allocation in percent
    #[serde(default, deserialize_with = "de::percent")]
    pub workload: u8,
    /// Fields this model does not know about, kept so rewrites don't drop them
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Extra fields never returned over the API
const PRIVATE_FIELDS: [&str; 1] = ["tokenHash"];

impl StaffMember {
    pub fn is_active(&self) -> bool {
        self.status == StaffStatus::Active
    }

    /// Active member with the admin role
    pub fn is_admin(&self) -> bool {
        self.role == StaffRole::Admin && self.is_active()
    }

    /// Move one rung up the ladder. Fails at the top and for fired members.
    pub fn promote(&mut self) -> Result<StaffRole, String> {
        if self.role == StaffRole::Fired {
            return Err("A fired staff member cannot be promoted".to_string());
        }
        let next = self
            .role
            .promoted()
            .ok_or_else(|| format!("{} is already at the highest role", self.name))?;
        self.role = next;
        Ok(next)
    }

    /// Move one rung down the ladder. Fails at the bottom and for fired members.
    pub fn demote(&mut self) -> Result<StaffRole, String> {
        if self.role == StaffRole::Fired {
            return Err("A fired staff member cannot be demoted".to_string());
        }
        let next = self
            .role
            .demoted()
            .ok_or_else(|| format!("{} is already at the lowest role", self.name))?;
        self.role = next;
        Ok(next)
    }

    /// Copy of the record without credential fields
    pub fn redacted(&self) -> Self {
        let mut member = self.clone();
        for field in PRIVATE_FIELDS {
            member.extra.remove(field);
        }
        member
    }
}

impl Entity for StaffMember {
    const KIND: &'static str = "Staff member";
    const COLLECTION: &'static str = "users";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "email", "department"];
    const DELETE_POLICY: DeletePolicy = DeletePolicy::Soft;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn normalize(&mut self) {
        self.email = self.email.trim().to_lowercase();
        let mut seen = std::collections::HashSet::new();
        self.skills.retain(|s| seen.insert(s.to_lowercase()));
    }

    fn check(&self, errors: &mut FieldErrors) {
        if !self.email.is_empty() {
            if let Err(e) = validate_email(&self.email) {
                errors.add("email", e);
            }
        }
    }

    fn soft_delete(&mut self) {
        self.status = StaffStatus::Inactive;
        self.role = StaffRole::Fired;
    }

    fn stamp(&mut self, now: &str, created: bool) {
        if created && self.join_date.is_empty() {
            self.join_date = now.chars().take(10).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(role: StaffRole) -> StaffMember {
        StaffMember {
            id: "s1".to_string(),
            name: "Ama".to_string(),
            email: "ama@agency.test".to_string(),
            role,
            department: "Engineering".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_promotion_ladder() {
        let mut m = member(StaffRole::Staff);
        assert_eq!(m.promote().unwrap(), StaffRole::Senior);
        assert_eq!(m.demote().unwrap(), StaffRole::Staff);

        let mut top = member(StaffRole::Admin);
        assert!(top.promote().is_err());
        let mut bottom = member(StaffRole::Intern);
        assert!(bottom.demote().is_err());
    }

    #[test]
    fn test_fired_member_cannot_move() {
        let mut m = member(StaffRole::Fired);
        assert!(m.promote().is_err());
        assert!(m.demote().is_err());
    }

    #[test]
    fn test_soft_delete_marks_fired() {
        let mut m = member(StaffRole::Senior);
        m.soft_delete();
        assert_eq!(m.status, StaffStatus::Inactive);
        assert_eq!(m.role, StaffRole::Fired);
        assert!(!m.is_active());
    }

    #[test]
    fn test_decode_keeps_unknown_fields_and_redacts_token() {
        let raw = json!({
            "id": "u1",
            "name": "Kofi",
            "email": "KOFI@Agency.test ",
            "role": "admin",
            "status": "on-leave",
            "skills": "rust, design, Rust",
            "tokenHash": "abc",
            "avatar": "kofi.png"
        });
        let mut m: StaffMember = serde_json::from_value(raw).unwrap();
        m.normalize();
        assert_eq!(m.email, "kofi@agency.test");
        assert_eq!(m.skills, vec!["rust", "design"]);
        assert_eq!(m.status, StaffStatus::OnLeave);
        assert_eq!(m.extra.get("tokenHash"), Some(&json!("abc")));

        let public = serde_json::to_value(m.redacted()).unwrap();
        assert!(public.get("tokenHash").is_none());
        assert_eq!(public["avatar"], "kofi.png");
        assert_eq!(public["status"], "on-leave");
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let raw = json!({"id": "u1", "status": "retired"});
        assert!(serde_json::from_value::<StaffMember>(raw).is_err());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Manager".parse::<StaffRole>().unwrap(), StaffRole::Manager);
        assert!("ceo".parse::<StaffRole>().is_err());
    }
}

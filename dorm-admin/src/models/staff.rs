use serde::{Deserialize, Serialize};

use super::de::id_string;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Staff,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Owners and admins hold every capability.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Unknown => "unknown",
        }
    }
}

/// Feature areas a staff member can be granted individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Meter,
    Invoices,
    Maintenance,
    Chat,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Meter => "meter",
            Capability::Invoices => "invoices",
            Capability::Maintenance => "maintenance",
            Capability::Chat => "chat",
        }
    }

    fn granted_by(&self, role: Role, permissions: &[String]) -> bool {
        role.is_privileged()
            || permissions
                .iter()
                .any(|p| p.trim().eq_ignore_ascii_case(self.as_str()))
    }
}

/// Signed-in staff member, as returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffProfile {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl StaffProfile {
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }

    pub fn initials(&self) -> String {
        let initials: String = self
            .name()
            .chars()
            .filter(|c| !c.is_whitespace())
            .take(2)
            .collect::<String>()
            .to_uppercase();

        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        capability.granted_by(self.role, &self.permissions)
    }
}

/// Result of `GET /staff/line/{lineUserId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffLookup {
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl StaffLookup {
    pub fn can(&self, capability: Capability) -> bool {
        self.is_staff && capability.granted_by(self.role.unwrap_or_default(), &self.permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: Role, permissions: &[&str]) -> StaffProfile {
        StaffProfile {
            id: "u1".into(),
            username: "nok".into(),
            display_name: None,
            role,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn admin_and_owner_hold_every_capability() {
        assert!(profile(Role::Owner, &[]).can(Capability::Meter));
        assert!(profile(Role::Admin, &[]).can(Capability::Chat));
    }

    #[test]
    fn staff_needs_explicit_grant() {
        assert!(!profile(Role::Staff, &["invoices"]).can(Capability::Meter));
        assert!(profile(Role::Staff, &["Meter"]).can(Capability::Meter));
    }

    #[test]
    fn lookup_requires_staff_flag() {
        let lookup = StaffLookup {
            is_staff: false,
            display_name: None,
            role: Some(Role::Admin),
            permissions: vec![],
        };
        assert!(!lookup.can(Capability::Meter));
    }

    #[test]
    fn initials_fall_back_to_username() {
        assert_eq!(profile(Role::Staff, &[]).initials(), "NO");
    }
}

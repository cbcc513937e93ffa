//! Common types used across the platform

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller role issued by the identity provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }

    /// Privileged roles bypass the approval workflow
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user performing a ledger operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Fail with `RoleNotAuthorized` unless the actor is privileged
    pub fn require_admin(&self, action: &str) -> crate::LedgerResult<()> {
        if self.role.is_privileged() {
            Ok(())
        } else {
            Err(crate::LedgerError::RoleNotAuthorized {
                role: self.role,
                action: action.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Admin, Role::Staff] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("owner"), None);
    }

    #[test]
    fn test_staff_cannot_act_as_admin() {
        let staff = Actor::new(Uuid::new_v4(), Role::Staff);
        assert!(staff.require_admin("approve production").is_err());

        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        assert!(admin.require_admin("approve production").is_ok());
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Employee = 2,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Employee),
            _ => None,
        }
    }
}

/// The authenticated caller of an engine operation.
///
/// Credentials are verified upstream; the engine only looks at the role.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Principal {
    pub id: u64,
    pub role: Role,
}

impl Principal {
    pub fn employee(id: u64) -> Self {
        Self {
            id,
            role: Role::Employee,
        }
    }

    pub fn admin(id: u64) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Learner,
    Support,
    Admin,
}

/// Named permissions checked by the authorization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageEntitlements,
    ViewPaymentRecords,
}

impl Role {
    /// Unknown role text falls back to the least privileged role.
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "support" => Role::Support,
            _ => Role::Learner,
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Learner => &[],
            Role::Support => &[Capability::ViewPaymentRecords],
            Role::Admin => &[
                Capability::ManageEntitlements,
                Capability::ViewPaymentRecords,
            ],
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self {
            Role::Learner => "learner",
            Role::Support => "support",
            Role::Admin => "admin",
        };
        write!(f, "{}", role)
    }
}

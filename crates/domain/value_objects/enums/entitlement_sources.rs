use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Who granted an entitlement. Admin grants are the one legitimate way to be
/// premium without a completed payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementSource {
    Payment,
    Admin,
}

impl EntitlementSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementSource::Payment => "payment",
            EntitlementSource::Admin => "admin",
        }
    }
}

impl Display for EntitlementSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

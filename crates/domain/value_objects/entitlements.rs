use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::entitlements::EntitlementEntity;
use crate::domain::value_objects::enums::plan_types::PlanType;

/// Read contract for the rest of the platform. `is_premium` already accounts for
/// expiry; `is_active` is the raw stored flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumStatusDto {
    pub is_active: bool,
    pub is_premium: bool,
    pub plan_type: Option<PlanType>,
    pub subscription_end: Option<DateTime<Utc>>,
}

impl PremiumStatusDto {
    pub fn from_entitlement(entitlement: Option<&EntitlementEntity>, now: DateTime<Utc>) -> Self {
        match entitlement {
            Some(entitlement) => Self {
                is_active: entitlement.is_active,
                is_premium: entitlement.is_premium_at(now),
                plan_type: entitlement.plan(),
                subscription_end: entitlement.subscription_end,
            },
            None => Self {
                is_active: false,
                is_premium: false,
                plan_type: None,
                subscription_end: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantEntitlementRequest {
    pub plan_type: Option<String>,
    /// Overrides the plan's catalog duration when set.
    pub duration_days: Option<i64>,
}

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::plan_types::PlanType;
use crate::infra::db::postgres::schema::entitlements;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = entitlements, primary_key(user_id))]
pub struct EntitlementEntity {
    pub user_id: Uuid,
    pub is_active: bool,
    pub plan_type: Option<String>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

impl EntitlementEntity {
    pub fn plan(&self) -> Option<PlanType> {
        self.plan_type.as_deref().and_then(PlanType::from_str)
    }

    /// Expiry is evaluated at read time; the stored flag is never swept.
    pub fn is_premium_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self
                .subscription_end
                .map(|subscription_end| now <= subscription_end)
                .unwrap_or(false)
    }
}

/// Insert-or-overwrite payload for the one-row-per-user table.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = entitlements, primary_key(user_id), treat_none_as_null = true)]
pub struct UpsertEntitlementEntity {
    pub user_id: Uuid,
    pub is_active: bool,
    pub plan_type: Option<String>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

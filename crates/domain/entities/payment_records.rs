use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::{
    payment_statuses::PaymentStatus, plan_types::PlanType,
};
use crate::infra::db::postgres::schema::payment_records;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_records)]
pub struct PaymentRecordEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_request_id: String,
    pub plan_type: String,
    pub amount_minor: i32,
    pub status: String,
    pub payment_id: Option<String>,
    pub raw_gateway_response: Option<serde_json::Value>,
    pub raw_webhook_payload: Option<serde_json::Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub subscription_start: Option<DateTime<Utc>>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecordEntity {
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        PaymentStatus::from_str(&self.status)
    }

    pub fn plan(&self) -> Option<PlanType> {
        PlanType::from_str(&self.plan_type)
    }

    pub fn is_completed(&self) -> bool {
        self.payment_status() == Some(PaymentStatus::Completed)
    }

    pub fn is_pending(&self) -> bool {
        self.payment_status() == Some(PaymentStatus::Pending)
    }

    /// No further transition is allowed. Unrecognised status text counts as settled.
    pub fn is_settled(&self) -> bool {
        self.payment_status().is_none_or(|status| status.is_terminal())
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_records)]
pub struct InsertPaymentRecordEntity {
    pub user_id: Uuid,
    pub payment_request_id: String,
    pub plan_type: String,
    pub amount_minor: i32,
    pub status: String,
    pub raw_gateway_response: Option<serde_json::Value>,
}

/// Columns written by the pending -> completed transition. `None` snapshots are
/// left untouched so each trigger only records what it actually saw.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = payment_records)]
pub struct CompletePaymentChangeset {
    pub status: String,
    pub payment_id: Option<String>,
    pub raw_gateway_response: Option<serde_json::Value>,
    pub raw_webhook_payload: Option<serde_json::Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub subscription_start: Option<DateTime<Utc>>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::reconciliation_incidents;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = reconciliation_incidents)]
pub struct ReconciliationIncidentEntity {
    pub id: Uuid,
    pub payment_request_id: String,
    pub user_id: Option<Uuid>,
    pub triggered_by: String,
    pub error: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = reconciliation_incidents)]
pub struct InsertReconciliationIncidentEntity {
    pub payment_request_id: String,
    pub user_id: Option<Uuid>,
    pub triggered_by: String,
    pub error: String,
}

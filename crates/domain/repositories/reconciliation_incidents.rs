use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::reconciliation_incidents::{
    InsertReconciliationIncidentEntity, ReconciliationIncidentEntity,
};

#[automock]
#[async_trait]
pub trait ReconciliationIncidentRepository {
    async fn record_incident(&self, incident: InsertReconciliationIncidentEntity) -> Result<Uuid>;

    async fn list_recent(&self, limit: i64) -> Result<Vec<ReconciliationIncidentEntity>>;
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::reconciliation_incidents::{
            InsertReconciliationIncidentEntity, ReconciliationIncidentEntity,
        },
        repositories::reconciliation_incidents::ReconciliationIncidentRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::reconciliation_incidents},
};

pub struct ReconciliationIncidentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ReconciliationIncidentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ReconciliationIncidentRepository for ReconciliationIncidentPostgres {
    async fn record_incident(&self, incident: InsertReconciliationIncidentEntity) -> Result<Uuid> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Uuid> {
            let mut conn = db_pool
                .get()
                .context("reconciliation_incidents: no pooled connection")?;

            let incident_id = insert_into(reconciliation_incidents::table)
                .values(&incident)
                .returning(reconciliation_incidents::id)
                .get_result::<Uuid>(&mut conn)?;

            Ok(incident_id)
        })
        .await??)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<ReconciliationIncidentEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<ReconciliationIncidentEntity>> {
            let mut conn = db_pool
                .get()
                .context("reconciliation_incidents: no pooled connection")?;

            let incidents = reconciliation_incidents::table
                .order(reconciliation_incidents::created_at.desc())
                .limit(limit)
                .select(ReconciliationIncidentEntity::as_select())
                .load::<ReconciliationIncidentEntity>(&mut conn)?;

            Ok(incidents)
        })
        .await??)
    }
}

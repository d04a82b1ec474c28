use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::entitlements::{EntitlementEntity, UpsertEntitlementEntity},
        repositories::entitlements::EntitlementRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::entitlements},
};

pub struct EntitlementPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EntitlementPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EntitlementRepository for EntitlementPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<EntitlementEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<EntitlementEntity>> {
            let mut conn = db_pool.get().context("entitlements: no pooled connection")?;

            let entitlement = entitlements::table
                .find(user_id)
                .select(EntitlementEntity::as_select())
                .first::<EntitlementEntity>(&mut conn)
                .optional()?;

            Ok(entitlement)
        })
        .await??)
    }

    async fn upsert(&self, entitlement: UpsertEntitlementEntity) -> Result<EntitlementEntity> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<EntitlementEntity> {
            let mut conn = db_pool.get().context("entitlements: no pooled connection")?;

            let saved = insert_into(entitlements::table)
                .values(&entitlement)
                .on_conflict(entitlements::user_id)
                .do_update()
                .set(&entitlement)
                .returning(EntitlementEntity::as_select())
                .get_result::<EntitlementEntity>(&mut conn)?;

            Ok(saved)
        })
        .await??)
    }

    async fn deactivate(&self, user_id: Uuid) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);
        let now = Utc::now();

        Ok(task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get().context("entitlements: no pooled connection")?;

            let affected = update(entitlements::table.find(user_id))
                .set((
                    entitlements::is_active.eq(false),
                    entitlements::updated_at.eq(now),
                ))
                .execute(&mut conn)?;

            Ok(affected > 0)
        })
        .await??)
    }
}

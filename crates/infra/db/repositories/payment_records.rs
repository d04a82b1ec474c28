use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*, update};
use serde_json::Value;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            entitlements::UpsertEntitlementEntity,
            payment_records::{
                CompletePaymentChangeset, InsertPaymentRecordEntity, PaymentRecordEntity,
            },
        },
        repositories::payment_records::PaymentRecordRepository,
        value_objects::{enums::payment_statuses::PaymentStatus, payments::CompletionOutcome},
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{entitlements, payment_records},
    },
};

pub struct PaymentRecordPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentRecordPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRecordRepository for PaymentRecordPostgres {
    async fn insert_pending(&self, record: InsertPaymentRecordEntity) -> Result<PaymentRecordEntity> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<PaymentRecordEntity> {
            let mut conn = db_pool.get().context("payment_records: no pooled connection")?;

            let inserted = insert_into(payment_records::table)
                .values(&record)
                .returning(PaymentRecordEntity::as_select())
                .get_result::<PaymentRecordEntity>(&mut conn)?;

            Ok(inserted)
        })
        .await??)
    }

    async fn find_by_payment_request_id(
        &self,
        payment_request_id: &str,
    ) -> Result<Option<PaymentRecordEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let payment_request_id = payment_request_id.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<PaymentRecordEntity>> {
            let mut conn = db_pool.get().context("payment_records: no pooled connection")?;

            let record = payment_records::table
                .filter(payment_records::payment_request_id.eq(payment_request_id.as_str()))
                .select(PaymentRecordEntity::as_select())
                .first::<PaymentRecordEntity>(&mut conn)
                .optional()?;

            Ok(record)
        })
        .await??)
    }

    async fn find_by_payment_request_id_for_user(
        &self,
        payment_request_id: &str,
        user_id: Uuid,
    ) -> Result<Option<PaymentRecordEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let payment_request_id = payment_request_id.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<PaymentRecordEntity>> {
            let mut conn = db_pool.get().context("payment_records: no pooled connection")?;

            let record = payment_records::table
                .filter(payment_records::payment_request_id.eq(payment_request_id.as_str()))
                .filter(payment_records::user_id.eq(user_id))
                .select(PaymentRecordEntity::as_select())
                .first::<PaymentRecordEntity>(&mut conn)
                .optional()?;

            Ok(record)
        })
        .await??)
    }

    async fn complete_and_grant(
        &self,
        payment_request_id: &str,
        changes: CompletePaymentChangeset,
        entitlement: UpsertEntitlementEntity,
    ) -> Result<CompletionOutcome> {
        // Diesel is synchronous; the transaction runs on the blocking pool so a
        // slow commit or an exhausted pool never parks a runtime worker.
        let db_pool = Arc::clone(&self.db_pool);
        let payment_request_id = payment_request_id.to_string();

        Ok(task::spawn_blocking(move || -> Result<CompletionOutcome> {
            let mut conn = db_pool.get().context("payment_records: no pooled connection")?;
            let request_id = payment_request_id.as_str();

            let outcome =
                conn.transaction::<CompletionOutcome, diesel::result::Error, _>(|conn| {
                    // The status filter is the compare-and-set: a concurrent trigger that
                    // already flipped the row makes this update match nothing.
                    let transitioned = update(payment_records::table)
                        .filter(payment_records::payment_request_id.eq(request_id))
                        .filter(payment_records::status.eq(PaymentStatus::Pending.as_str()))
                        .set(&changes)
                        .returning(PaymentRecordEntity::as_select())
                        .get_result::<PaymentRecordEntity>(conn)
                        .optional()?;

                    match transitioned {
                        Some(record) => {
                            insert_into(entitlements::table)
                                .values(&entitlement)
                                .on_conflict(entitlements::user_id)
                                .do_update()
                                .set(&entitlement)
                                .execute(conn)?;

                            Ok(CompletionOutcome::Completed(record))
                        }
                        None => {
                            let current = payment_records::table
                                .filter(payment_records::payment_request_id.eq(request_id))
                                .select(PaymentRecordEntity::as_select())
                                .first::<PaymentRecordEntity>(conn)?;

                            Ok(CompletionOutcome::AlreadySettled(current))
                        }
                    }
                })?;

            Ok(outcome)
        })
        .await??)
    }

    async fn mark_failed(
        &self,
        payment_request_id: &str,
        user_id: Uuid,
        raw_gateway_response: Value,
    ) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);
        let payment_request_id = payment_request_id.to_string();
        let now = Utc::now();

        Ok(task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get().context("payment_records: no pooled connection")?;

            let affected = update(payment_records::table)
                .filter(payment_records::payment_request_id.eq(payment_request_id.as_str()))
                .filter(payment_records::user_id.eq(user_id))
                .filter(payment_records::status.eq(PaymentStatus::Pending.as_str()))
                .set((
                    payment_records::status.eq(PaymentStatus::Failed.as_str()),
                    payment_records::raw_gateway_response.eq(Some(raw_gateway_response)),
                    payment_records::updated_at.eq(now),
                ))
                .execute(&mut conn)?;

            Ok(affected > 0)
        })
        .await??)
    }
}

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::entities::{
    entitlements::UpsertEntitlementEntity,
    payment_records::{CompletePaymentChangeset, InsertPaymentRecordEntity, PaymentRecordEntity},
};
use crate::domain::value_objects::payments::CompletionOutcome;

#[automock]
#[async_trait]
pub trait PaymentRecordRepository {
    async fn insert_pending(&self, record: InsertPaymentRecordEntity) -> Result<PaymentRecordEntity>;

    async fn find_by_payment_request_id(
        &self,
        payment_request_id: &str,
    ) -> Result<Option<PaymentRecordEntity>>;

    /// Scoped lookup for the authenticated path: a record owned by someone else is
    /// indistinguishable from a missing one.
    async fn find_by_payment_request_id_for_user(
        &self,
        payment_request_id: &str,
        user_id: Uuid,
    ) -> Result<Option<PaymentRecordEntity>>;

    /// Atomically moves the record from `pending` to `completed` and upserts the
    /// entitlement. Only the caller that flips the status writes the entitlement.
    async fn complete_and_grant(
        &self,
        payment_request_id: &str,
        changes: CompletePaymentChangeset,
        entitlement: UpsertEntitlementEntity,
    ) -> Result<CompletionOutcome>;

    /// Guarded `pending -> failed`. Returns whether a row changed.
    async fn mark_failed(
        &self,
        payment_request_id: &str,
        user_id: Uuid,
        raw_gateway_response: Value,
    ) -> Result<bool>;
}

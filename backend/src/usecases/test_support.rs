//! In-memory stores for multi-step reconciliation tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use skillforge_core::domain::{
    entities::{
        entitlements::{EntitlementEntity, UpsertEntitlementEntity},
        payment_records::{CompletePaymentChangeset, InsertPaymentRecordEntity, PaymentRecordEntity},
        reconciliation_incidents::{
            InsertReconciliationIncidentEntity, ReconciliationIncidentEntity,
        },
    },
    repositories::{
        payment_records::PaymentRecordRepository,
        reconciliation_incidents::ReconciliationIncidentRepository,
    },
    value_objects::{
        enums::{payment_statuses::PaymentStatus, plan_types::PlanType},
        payments::CompletionOutcome,
        plans::plan_details,
    },
};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct BillingState {
    records: HashMap<String, PaymentRecordEntity>,
    entitlements: HashMap<Uuid, UpsertEntitlementEntity>,
    entitlement_writes: usize,
    completion_failures_left: usize,
}

/// Payment records and entitlements behind one lock, so `complete_and_grant` is
/// atomic the way the database transaction is.
#[derive(Default)]
pub(crate) struct InMemoryBilling {
    state: Mutex<BillingState>,
}

impl InMemoryBilling {
    pub(crate) fn with_pending(user_id: Uuid, payment_request_id: &str, plan: PlanType) -> Self {
        let billing = Self::default();
        billing.insert(pending_record(user_id, payment_request_id, plan));
        billing
    }

    pub(crate) fn insert(&self, record: PaymentRecordEntity) {
        let mut state = self.state.lock().unwrap();
        state
            .records
            .insert(record.payment_request_id.clone(), record);
    }

    pub(crate) fn record(&self, payment_request_id: &str) -> Option<PaymentRecordEntity> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(payment_request_id)
            .cloned()
    }

    pub(crate) fn entitlement(&self, user_id: Uuid) -> Option<UpsertEntitlementEntity> {
        self.state
            .lock()
            .unwrap()
            .entitlements
            .get(&user_id)
            .cloned()
    }

    pub(crate) fn entitlement_writes(&self) -> usize {
        self.state.lock().unwrap().entitlement_writes
    }

    /// Makes the next `count` completion writes fail before touching state.
    pub(crate) fn fail_next_completions(&self, count: usize) {
        self.state.lock().unwrap().completion_failures_left = count;
    }
}

pub(crate) fn pending_record(
    user_id: Uuid,
    payment_request_id: &str,
    plan: PlanType,
) -> PaymentRecordEntity {
    let now = Utc::now();
    PaymentRecordEntity {
        id: Uuid::new_v4(),
        user_id,
        payment_request_id: payment_request_id.to_string(),
        plan_type: plan.as_str().to_string(),
        amount_minor: plan_details(plan).amount_minor,
        status: PaymentStatus::Pending.as_str().to_string(),
        payment_id: None,
        raw_gateway_response: None,
        raw_webhook_payload: None,
        completed_at: None,
        subscription_start: None,
        subscription_end: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl PaymentRecordRepository for InMemoryBilling {
    async fn insert_pending(&self, record: InsertPaymentRecordEntity) -> Result<PaymentRecordEntity> {
        let now = Utc::now();
        let entity = PaymentRecordEntity {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            payment_request_id: record.payment_request_id,
            plan_type: record.plan_type,
            amount_minor: record.amount_minor,
            status: record.status,
            payment_id: None,
            raw_gateway_response: record.raw_gateway_response,
            raw_webhook_payload: None,
            completed_at: None,
            subscription_start: None,
            subscription_end: None,
            created_at: now,
            updated_at: now,
        };
        self.insert(entity.clone());
        Ok(entity)
    }

    async fn find_by_payment_request_id(
        &self,
        payment_request_id: &str,
    ) -> Result<Option<PaymentRecordEntity>> {
        Ok(self.record(payment_request_id))
    }

    async fn find_by_payment_request_id_for_user(
        &self,
        payment_request_id: &str,
        user_id: Uuid,
    ) -> Result<Option<PaymentRecordEntity>> {
        Ok(self
            .record(payment_request_id)
            .filter(|record| record.user_id == user_id))
    }

    async fn complete_and_grant(
        &self,
        payment_request_id: &str,
        changes: CompletePaymentChangeset,
        entitlement: UpsertEntitlementEntity,
    ) -> Result<CompletionOutcome> {
        let mut state = self.state.lock().unwrap();

        if state.completion_failures_left > 0 {
            state.completion_failures_left -= 1;
            return Err(anyhow!("connection reset by peer"));
        }

        let record = state
            .records
            .get_mut(payment_request_id)
            .ok_or_else(|| anyhow!("record not found"))?;

        if record.status != PaymentStatus::Pending.as_str() {
            return Ok(CompletionOutcome::AlreadySettled(record.clone()));
        }

        record.status = changes.status;
        if changes.payment_id.is_some() {
            record.payment_id = changes.payment_id;
        }
        if changes.raw_gateway_response.is_some() {
            record.raw_gateway_response = changes.raw_gateway_response;
        }
        if changes.raw_webhook_payload.is_some() {
            record.raw_webhook_payload = changes.raw_webhook_payload;
        }
        record.completed_at = changes.completed_at;
        record.subscription_start = changes.subscription_start;
        record.subscription_end = changes.subscription_end;
        record.updated_at = changes.updated_at;
        let completed = record.clone();

        state.entitlements.insert(entitlement.user_id, entitlement);
        state.entitlement_writes += 1;

        Ok(CompletionOutcome::Completed(completed))
    }

    async fn mark_failed(
        &self,
        payment_request_id: &str,
        user_id: Uuid,
        raw_gateway_response: Value,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();

        match state.records.get_mut(payment_request_id) {
            Some(record)
                if record.user_id == user_id && record.status == PaymentStatus::Pending.as_str() =>
            {
                record.status = PaymentStatus::Failed.as_str().to_string();
                record.raw_gateway_response = Some(raw_gateway_response);
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub(crate) struct InMemoryIncidents {
    incidents: Mutex<Vec<ReconciliationIncidentEntity>>,
}

impl InMemoryIncidents {
    pub(crate) fn recorded(&self) -> Vec<ReconciliationIncidentEntity> {
        self.incidents.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReconciliationIncidentRepository for InMemoryIncidents {
    async fn record_incident(&self, incident: InsertReconciliationIncidentEntity) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.incidents.lock().unwrap().push(ReconciliationIncidentEntity {
            id,
            payment_request_id: incident.payment_request_id,
            user_id: incident.user_id,
            triggered_by: incident.triggered_by,
            error: incident.error,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<ReconciliationIncidentEntity>> {
        let incidents = self.incidents.lock().unwrap();
        Ok(incidents
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

pub(crate) fn entitlement_row(upsert: &UpsertEntitlementEntity) -> EntitlementEntity {
    EntitlementEntity {
        user_id: upsert.user_id,
        is_active: upsert.is_active,
        plan_type: upsert.plan_type.clone(),
        subscription_end: upsert.subscription_end,
        source: upsert.source.clone(),
        updated_at: upsert.updated_at,
    }
}

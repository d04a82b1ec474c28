use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{
    payment_records::PaymentRecordEntity, reconciliation_incidents::ReconciliationIncidentEntity,
};

/// Result of the guarded pending -> completed write.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// This call owned the transition; the entitlement was written in the same transaction.
    Completed(PaymentRecordEntity),
    /// The record had already left `pending` (another trigger won, or it failed earlier).
    AlreadySettled(PaymentRecordEntity),
}

/// Which entry point drove a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationTrigger {
    Verify,
    Webhook,
}

impl ReconciliationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationTrigger::Verify => "verify",
            ReconciliationTrigger::Webhook => "webhook",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub plan_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    pub payment_request_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub payment_request_id: Option<String>,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyPaymentResponse {
    pub fn verified() -> Self {
        Self {
            success: true,
            status: Some("completed".to_string()),
            message: Some("Payment verified successfully".to_string()),
        }
    }

    pub fn already_verified() -> Self {
        Self {
            success: true,
            status: Some("completed".to_string()),
            message: Some("Payment already verified".to_string()),
        }
    }

    pub fn not_completed_yet() -> Self {
        Self {
            success: false,
            status: Some("pending".to_string()),
            message: Some("Payment not completed yet".to_string()),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            status: Some("failed".to_string()),
            message: Some("Payment failed at the payment provider".to_string()),
        }
    }
}

/// What the webhook entry point did with a delivery. Every variant is acknowledged
/// to the processor with `{success: true}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Completed,
    AlreadyCompleted,
    /// Non-success status code from the processor; nothing written.
    Ignored,
    /// Record exists but is not pending (e.g. failed on the verify path).
    NotPending,
}

#[derive(Debug, Serialize)]
pub struct WebhookAckResponse {
    pub success: bool,
}

/// Back-office view of one checkout attempt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecordDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_request_id: String,
    pub plan_type: String,
    pub amount_minor: i32,
    pub status: String,
    pub payment_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub subscription_start: Option<DateTime<Utc>>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentRecordEntity> for PaymentRecordDto {
    fn from(value: PaymentRecordEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            payment_request_id: value.payment_request_id,
            plan_type: value.plan_type,
            amount_minor: value.amount_minor,
            status: value.status,
            payment_id: value.payment_id,
            completed_at: value.completed_at,
            subscription_start: value.subscription_start,
            subscription_end: value.subscription_end,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationIncidentDto {
    pub id: Uuid,
    pub payment_request_id: String,
    pub user_id: Option<Uuid>,
    pub triggered_by: String,
    pub error: String,
    pub created_at: DateTime<Utc>,
}

impl From<ReconciliationIncidentEntity> for ReconciliationIncidentDto {
    fn from(value: ReconciliationIncidentEntity) -> Self {
        Self {
            id: value.id,
            payment_request_id: value.payment_request_id,
            user_id: value.user_id,
            triggered_by: value.triggered_by,
            error: value.error,
            created_at: value.created_at,
        }
    }
}

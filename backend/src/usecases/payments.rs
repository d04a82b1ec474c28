use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use skillforge_core::{
    domain::{
        entities::{
            entitlements::UpsertEntitlementEntity,
            payment_records::{
                CompletePaymentChangeset, InsertPaymentRecordEntity, PaymentRecordEntity,
            },
            reconciliation_incidents::InsertReconciliationIncidentEntity,
        },
        repositories::{
            payment_records::PaymentRecordRepository,
            reconciliation_incidents::ReconciliationIncidentRepository,
        },
        value_objects::{
            enums::{
                entitlement_sources::EntitlementSource, payment_statuses::PaymentStatus,
                plan_types::PlanType,
            },
            payments::{
                CompletionOutcome, CreateCheckoutRequest, CreateCheckoutResponse,
                ReconciliationTrigger, VerifyPaymentRequest, VerifyPaymentResponse,
                WebhookOutcome,
            },
            plans::{PlanDto, list_plans, plan_details},
        },
    },
    payments::{
        instamojo_client::{
            CreatePaymentRequestInput, CreatedPaymentRequest, GatewayError, InstamojoClient,
            RemotePaymentRequest, WEBHOOK_SUCCESS_STATUS, is_well_formed_payment_request_id,
        },
        webhook_signature::{MAC_FIELD, verify_webhook_mac},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::error_response;
use crate::config::config_model::Checkout;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_request(
        &self,
        input: CreatePaymentRequestInput,
    ) -> Result<CreatedPaymentRequest, GatewayError>;

    async fn get_payment_request(
        &self,
        payment_request_id: &str,
    ) -> Result<RemotePaymentRequest, GatewayError>;
}

#[async_trait]
impl PaymentGateway for InstamojoClient {
    async fn create_payment_request(
        &self,
        input: CreatePaymentRequestInput,
    ) -> Result<CreatedPaymentRequest, GatewayError> {
        self.create_payment_request(&input).await
    }

    async fn get_payment_request(
        &self,
        payment_request_id: &str,
    ) -> Result<RemotePaymentRequest, GatewayError> {
        self.get_payment_request(payment_request_id).await
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),
    #[error("webhook signature rejected")]
    Signature,
    #[error("payment record not found")]
    NotFound,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("payment state could not be persisted: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Validation(_) | PaymentError::Signature => StatusCode::BAD_REQUEST,
            PaymentError::NotFound => StatusCode::NOT_FOUND,
            PaymentError::Gateway(_) | PaymentError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            PaymentError::Validation(message) => message.clone(),
            PaymentError::Signature => "Invalid signature".to_string(),
            PaymentError::NotFound => "Payment not found".to_string(),
            PaymentError::Gateway(_) => {
                "Payment provider is unavailable. Please try again, or contact support if you were charged."
                    .to_string()
            }
            PaymentError::Persistence(_) => {
                "We could not confirm your payment. Please check back shortly or contact support."
                    .to_string()
            }
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.public_message())
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentError>;

/// Bounded retry for the completion write, which runs after the processor has
/// already taken the money.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRetry {
    pub max_attempts: u32,
    /// Attempt `n` waits `n * base_delay` before the next try.
    pub base_delay: Duration,
}

impl Default for CompletionRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Checkout creation and reconciliation of the verify and webhook triggers.
pub struct PaymentUseCase<P, I, G>
where
    P: PaymentRecordRepository + Send + Sync + 'static,
    I: ReconciliationIncidentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    payment_repo: Arc<P>,
    incident_repo: Arc<I>,
    gateway: Arc<G>,
    checkout: Checkout,
    private_salt: Option<String>,
    retry: CompletionRetry,
}

impl<P, I, G> PaymentUseCase<P, I, G>
where
    P: PaymentRecordRepository + Send + Sync + 'static,
    I: ReconciliationIncidentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        payment_repo: Arc<P>,
        incident_repo: Arc<I>,
        gateway: Arc<G>,
        checkout: Checkout,
        private_salt: Option<String>,
    ) -> Self {
        Self {
            payment_repo,
            incident_repo,
            gateway,
            checkout,
            private_salt,
            retry: CompletionRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: CompletionRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn list_plans(&self) -> Vec<PlanDto> {
        list_plans()
    }

    pub async fn create_checkout(
        &self,
        user_id: Uuid,
        user_email: Option<String>,
        request: CreateCheckoutRequest,
    ) -> UseCaseResult<CreateCheckoutResponse> {
        let plan = request
            .plan_type
            .as_deref()
            .and_then(PlanType::from_str)
            .ok_or_else(|| {
                warn!(
                    %user_id,
                    plan_type = ?request.plan_type,
                    "checkout: unknown plan type"
                );
                PaymentError::Validation("Invalid plan type".to_string())
            })?;

        let email = user_email.ok_or_else(|| {
            warn!(%user_id, "checkout: missing email for checkout");
            PaymentError::Validation("An email address is required for checkout".to_string())
        })?;

        let details = plan_details(plan);
        info!(
            %user_id,
            plan_type = %plan,
            amount_minor = details.amount_minor,
            "checkout: creating payment request"
        );

        let created = self
            .gateway
            .create_payment_request(CreatePaymentRequestInput {
                amount: details.amount_display(),
                purpose: details.purpose(),
                buyer_name: buyer_name(&email),
                email,
                redirect_url: self.checkout.redirect_url.clone(),
                webhook_url: self.checkout.webhook_url.clone(),
                allow_repeated_payments: false,
            })
            .await
            .map_err(|err| {
                error!(%user_id, error = %err, "checkout: gateway rejected payment request");
                PaymentError::Gateway(err)
            })?;

        let record = self
            .payment_repo
            .insert_pending(InsertPaymentRecordEntity {
                user_id,
                payment_request_id: created.payment_request_id.clone(),
                plan_type: plan.as_str().to_string(),
                amount_minor: details.amount_minor,
                status: PaymentStatus::Pending.as_str().to_string(),
                raw_gateway_response: Some(created.raw),
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    payment_request_id = %created.payment_request_id,
                    db_error = ?err,
                    "checkout: failed to store pending payment record"
                );
                PaymentError::Persistence(err)
            })?;

        info!(
            %user_id,
            payment_request_id = %record.payment_request_id,
            "checkout: pending payment record created"
        );

        Ok(CreateCheckoutResponse {
            payment_request_id: record.payment_request_id,
            checkout_url: created.checkout_url,
        })
    }

    /// Authenticated reconciliation after the processor redirects the browser back.
    pub async fn verify_payment(
        &self,
        user_id: Uuid,
        request: VerifyPaymentRequest,
    ) -> UseCaseResult<VerifyPaymentResponse> {
        let payment_request_id = request
            .payment_request_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PaymentError::Validation("paymentRequestId is required".to_string()))?
            .to_string();

        if !is_well_formed_payment_request_id(&payment_request_id) {
            warn!(%user_id, "payment_verify: malformed payment request id");
            return Err(PaymentError::Validation(
                "paymentRequestId is malformed".to_string(),
            ));
        }

        info!(%user_id, %payment_request_id, "payment_verify: verifying payment");

        let remote = self
            .gateway
            .get_payment_request(&payment_request_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %payment_request_id,
                    error = %err,
                    "payment_verify: failed to fetch remote payment request"
                );
                PaymentError::Gateway(err)
            })?;

        if remote.is_failed() {
            return self
                .settle_remote_failure(user_id, &payment_request_id, remote.raw)
                .await;
        }

        if !remote.is_completed() {
            info!(
                %user_id,
                %payment_request_id,
                remote_status = %remote.status,
                "payment_verify: payment not completed yet"
            );
            return Ok(VerifyPaymentResponse::not_completed_yet());
        }

        let record = self.find_owned_record(user_id, &payment_request_id).await?;

        if record.is_completed() {
            info!(%user_id, %payment_request_id, "payment_verify: payment already verified");
            return Ok(VerifyPaymentResponse::already_verified());
        }

        let now = Utc::now();
        let (changes, entitlement) = completion_for(
            &record,
            now,
            remote.payment_id.or(request.payment_id),
            Some(remote.raw),
            None,
        )?;

        match self
            .complete_with_retry(ReconciliationTrigger::Verify, &record, changes, entitlement)
            .await?
        {
            CompletionOutcome::Completed(completed) => {
                info!(
                    %user_id,
                    %payment_request_id,
                    plan_type = %completed.plan_type,
                    subscription_end = ?completed.subscription_end,
                    "payment_verify: payment completed and entitlement granted"
                );
                Ok(VerifyPaymentResponse::verified())
            }
            CompletionOutcome::AlreadySettled(current) if current.is_completed() => {
                info!(
                    %user_id,
                    %payment_request_id,
                    "payment_verify: another trigger completed the payment first"
                );
                Ok(VerifyPaymentResponse::already_verified())
            }
            CompletionOutcome::AlreadySettled(current) => {
                self.report_settled_conflict(ReconciliationTrigger::Verify, &current)
                    .await;
                Ok(VerifyPaymentResponse::failed())
            }
        }
    }

    /// Processor-initiated reconciliation. The form is untrusted until the MAC checks out.
    pub async fn handle_webhook(
        &self,
        fields: HashMap<String, String>,
    ) -> UseCaseResult<WebhookOutcome> {
        let claimed_mac = fields.get(MAC_FIELD).map(String::as_str).unwrap_or_default();
        if claimed_mac.is_empty() {
            warn!("payment_webhook: delivery without mac");
            return Err(PaymentError::Signature);
        }

        if !verify_webhook_mac(&fields, claimed_mac, self.private_salt.as_deref()) {
            return Err(PaymentError::Signature);
        }

        let status = fields.get("status").map(String::as_str).unwrap_or_default();
        if status != WEBHOOK_SUCCESS_STATUS {
            info!(
                payment_request_id = ?fields.get("payment_request_id"),
                %status,
                "payment_webhook: non-success status acknowledged without changes"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let payment_request_id = fields
            .get("payment_request_id")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                warn!("payment_webhook: signed delivery without payment_request_id");
                PaymentError::Validation("payment_request_id is required".to_string())
            })?;

        let record = self
            .payment_repo
            .find_by_payment_request_id(&payment_request_id)
            .await
            .map_err(|err| {
                error!(
                    %payment_request_id,
                    db_error = ?err,
                    "payment_webhook: failed to load payment record"
                );
                PaymentError::Persistence(err)
            })?
            .ok_or_else(|| {
                warn!(
                    %payment_request_id,
                    "payment_webhook: signed delivery for unknown payment request"
                );
                PaymentError::NotFound
            })?;

        if record.is_completed() {
            info!(%payment_request_id, "payment_webhook: payment already completed");
            return Ok(WebhookOutcome::AlreadyCompleted);
        }

        if record.is_settled() {
            self.report_settled_conflict(ReconciliationTrigger::Webhook, &record)
                .await;
            return Ok(WebhookOutcome::NotPending);
        }

        let now = Utc::now();
        let (changes, entitlement) = completion_for(
            &record,
            now,
            fields.get("payment_id").cloned(),
            None,
            Some(audit_snapshot(&fields)),
        )?;

        match self
            .complete_with_retry(ReconciliationTrigger::Webhook, &record, changes, entitlement)
            .await?
        {
            CompletionOutcome::Completed(completed) => {
                info!(
                    user_id = %completed.user_id,
                    %payment_request_id,
                    plan_type = %completed.plan_type,
                    subscription_end = ?completed.subscription_end,
                    "payment_webhook: payment completed and entitlement granted"
                );
                Ok(WebhookOutcome::Completed)
            }
            CompletionOutcome::AlreadySettled(current) if current.is_completed() => {
                info!(
                    %payment_request_id,
                    "payment_webhook: another trigger completed the payment first"
                );
                Ok(WebhookOutcome::AlreadyCompleted)
            }
            CompletionOutcome::AlreadySettled(current) => {
                self.report_settled_conflict(ReconciliationTrigger::Webhook, &current)
                    .await;
                Ok(WebhookOutcome::NotPending)
            }
        }
    }

    async fn find_owned_record(
        &self,
        user_id: Uuid,
        payment_request_id: &str,
    ) -> UseCaseResult<PaymentRecordEntity> {
        self.payment_repo
            .find_by_payment_request_id_for_user(payment_request_id, user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %payment_request_id,
                    db_error = ?err,
                    "payment_verify: failed to load payment record"
                );
                PaymentError::Persistence(err)
            })?
            .ok_or_else(|| {
                warn!(
                    %user_id,
                    %payment_request_id,
                    "payment_verify: no payment record for this user"
                );
                PaymentError::NotFound
            })
    }

    async fn settle_remote_failure(
        &self,
        user_id: Uuid,
        payment_request_id: &str,
        raw: Value,
    ) -> UseCaseResult<VerifyPaymentResponse> {
        let record = self.find_owned_record(user_id, payment_request_id).await?;

        if record.is_completed() {
            warn!(
                %user_id,
                %payment_request_id,
                "payment_verify: remote reports failure for a completed payment; keeping completed"
            );
            return Ok(VerifyPaymentResponse::already_verified());
        }

        let changed = self
            .payment_repo
            .mark_failed(payment_request_id, user_id, raw)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %payment_request_id,
                    db_error = ?err,
                    "payment_verify: failed to mark payment failed"
                );
                PaymentError::Persistence(err)
            })?;

        info!(
            %user_id,
            %payment_request_id,
            changed,
            "payment_verify: remote payment failed"
        );
        Ok(VerifyPaymentResponse::failed())
    }

    async fn complete_with_retry(
        &self,
        trigger: ReconciliationTrigger,
        record: &PaymentRecordEntity,
        changes: CompletePaymentChangeset,
        entitlement: UpsertEntitlementEntity,
    ) -> UseCaseResult<CompletionOutcome> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = self
                .payment_repo
                .complete_and_grant(
                    &record.payment_request_id,
                    changes.clone(),
                    entitlement.clone(),
                )
                .await;

            let err = match result {
                Ok(outcome) => return Ok(outcome),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                error!(
                    user_id = %record.user_id,
                    payment_request_id = %record.payment_request_id,
                    trigger = trigger.as_str(),
                    attempts = attempt,
                    db_error = ?err,
                    "payment_reconcile: completion write failed after payment was confirmed; manual reconciliation required"
                );
                self.record_incident(trigger, record, format!("{err:#}"))
                    .await;
                return Err(PaymentError::Persistence(err));
            }

            warn!(
                user_id = %record.user_id,
                payment_request_id = %record.payment_request_id,
                trigger = trigger.as_str(),
                attempt,
                db_error = ?err,
                "payment_reconcile: completion write failed, retrying"
            );
            tokio::time::sleep(self.retry.base_delay * attempt).await;
            attempt += 1;
        }
    }

    /// A success signal for a record that already failed. Nothing is rewritten;
    /// the conflict goes to the incident table for a human.
    async fn report_settled_conflict(
        &self,
        trigger: ReconciliationTrigger,
        record: &PaymentRecordEntity,
    ) {
        error!(
            user_id = %record.user_id,
            payment_request_id = %record.payment_request_id,
            status = %record.status,
            trigger = trigger.as_str(),
            "payment_reconcile: success reported for a payment that is no longer pending"
        );
        self.record_incident(
            trigger,
            record,
            format!(
                "success reported while local status is {}",
                record.status
            ),
        )
        .await;
    }

    async fn record_incident(
        &self,
        trigger: ReconciliationTrigger,
        record: &PaymentRecordEntity,
        error_text: String,
    ) {
        let incident = InsertReconciliationIncidentEntity {
            payment_request_id: record.payment_request_id.clone(),
            user_id: Some(record.user_id),
            triggered_by: trigger.as_str().to_string(),
            error: error_text,
        };

        if let Err(err) = self.incident_repo.record_incident(incident).await {
            error!(
                payment_request_id = %record.payment_request_id,
                db_error = ?err,
                "payment_reconcile: failed to record reconciliation incident"
            );
        }
    }
}

/// Completion changes and the matching entitlement, computed from the stored plan.
fn completion_for(
    record: &PaymentRecordEntity,
    now: DateTime<Utc>,
    payment_id: Option<String>,
    raw_gateway_response: Option<Value>,
    raw_webhook_payload: Option<Value>,
) -> UseCaseResult<(CompletePaymentChangeset, UpsertEntitlementEntity)> {
    let plan = record.plan().ok_or_else(|| {
        error!(
            payment_request_id = %record.payment_request_id,
            plan_type = %record.plan_type,
            "payment_reconcile: stored plan type is not in the catalog"
        );
        PaymentError::Persistence(anyhow!("unknown stored plan type {}", record.plan_type))
    })?;

    let (subscription_start, subscription_end) = plan_details(plan)
        .subscription_window(now)
        .ok_or_else(|| PaymentError::Persistence(anyhow!("subscription end overflows")))?;

    let changes = CompletePaymentChangeset {
        status: PaymentStatus::Completed.as_str().to_string(),
        payment_id: payment_id.filter(|id| !id.trim().is_empty()),
        raw_gateway_response,
        raw_webhook_payload,
        completed_at: Some(now),
        subscription_start: Some(subscription_start),
        subscription_end: Some(subscription_end),
        updated_at: now,
    };

    let entitlement = UpsertEntitlementEntity {
        user_id: record.user_id,
        is_active: true,
        plan_type: Some(plan.as_str().to_string()),
        subscription_end: Some(subscription_end),
        source: EntitlementSource::Payment.as_str().to_string(),
        updated_at: now,
    };

    Ok((changes, entitlement))
}

fn audit_snapshot(fields: &HashMap<String, String>) -> Value {
    let snapshot = fields
        .iter()
        .filter(|(name, _)| name.as_str() != MAC_FIELD)
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect::<serde_json::Map<_, _>>();
    Value::Object(snapshot)
}

fn buyer_name(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("SkillForge learner")
        .to_string()
}

#[cfg(test)]
mod tests;

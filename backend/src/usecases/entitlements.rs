use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use skillforge_core::domain::{
    entities::entitlements::UpsertEntitlementEntity,
    repositories::{
        entitlements::EntitlementRepository, payment_records::PaymentRecordRepository,
        reconciliation_incidents::ReconciliationIncidentRepository,
        user_roles::UserRoleRepository,
    },
    value_objects::{
        entitlements::{GrantEntitlementRequest, PremiumStatusDto},
        enums::{entitlement_sources::EntitlementSource, plan_types::PlanType, roles::Capability},
        payments::{PaymentRecordDto, ReconciliationIncidentDto},
        plans::plan_details,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::authorization::authorize;
use crate::axum_http::error_responses::error_response;

const MAX_GRANT_DAYS: i64 = 3650;
const RECENT_INCIDENT_LIMIT: i64 = 50;

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("{0}")]
    Validation(String),
    #[error("caller lacks the required capability")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EntitlementError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EntitlementError::Validation(_) => StatusCode::BAD_REQUEST,
            EntitlementError::Forbidden => StatusCode::FORBIDDEN,
            EntitlementError::NotFound => StatusCode::NOT_FOUND,
            EntitlementError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EntitlementError {
    fn into_response(self) -> Response {
        let message = match &self {
            EntitlementError::Validation(message) => message.clone(),
            EntitlementError::Forbidden => "Forbidden".to_string(),
            EntitlementError::NotFound => "Not found".to_string(),
            EntitlementError::Internal(_) => "Internal server error".to_string(),
        };
        error_response(self.status_code(), message)
    }
}

pub type UseCaseResult<T> = std::result::Result<T, EntitlementError>;

/// Premium status reads plus the privileged back-office operations.
pub struct EntitlementUseCase<E, R, P, I>
where
    E: EntitlementRepository + Send + Sync + 'static,
    R: UserRoleRepository + Send + Sync + 'static,
    P: PaymentRecordRepository + Send + Sync + 'static,
    I: ReconciliationIncidentRepository + Send + Sync + 'static,
{
    entitlement_repo: Arc<E>,
    role_repo: Arc<R>,
    payment_repo: Arc<P>,
    incident_repo: Arc<I>,
}

impl<E, R, P, I> EntitlementUseCase<E, R, P, I>
where
    E: EntitlementRepository + Send + Sync + 'static,
    R: UserRoleRepository + Send + Sync + 'static,
    P: PaymentRecordRepository + Send + Sync + 'static,
    I: ReconciliationIncidentRepository + Send + Sync + 'static,
{
    pub fn new(
        entitlement_repo: Arc<E>,
        role_repo: Arc<R>,
        payment_repo: Arc<P>,
        incident_repo: Arc<I>,
    ) -> Self {
        Self {
            entitlement_repo,
            role_repo,
            payment_repo,
            incident_repo,
        }
    }

    pub async fn premium_status(&self, user_id: Uuid) -> UseCaseResult<PremiumStatusDto> {
        let entitlement = self
            .entitlement_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "premium: failed to load entitlement");
                EntitlementError::Internal(err)
            })?;

        Ok(PremiumStatusDto::from_entitlement(
            entitlement.as_ref(),
            Utc::now(),
        ))
    }

    async fn require(&self, actor_id: Uuid, capability: Capability) -> UseCaseResult<()> {
        match authorize(self.role_repo.as_ref(), actor_id, capability).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(EntitlementError::Forbidden),
            Err(err) => {
                error!(%actor_id, db_error = ?err, "admin: failed to resolve caller role");
                Err(EntitlementError::Internal(err))
            }
        }
    }

    pub async fn grant(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        request: GrantEntitlementRequest,
    ) -> UseCaseResult<PremiumStatusDto> {
        self.require(actor_id, Capability::ManageEntitlements).await?;

        let plan = request
            .plan_type
            .as_deref()
            .and_then(PlanType::from_str)
            .ok_or_else(|| EntitlementError::Validation("Invalid plan type".to_string()))?;

        let days = request
            .duration_days
            .unwrap_or(plan_details(plan).duration_days);
        if !(1..=MAX_GRANT_DAYS).contains(&days) {
            return Err(EntitlementError::Validation(format!(
                "durationDays must be between 1 and {MAX_GRANT_DAYS}"
            )));
        }

        let now = Utc::now();
        let saved = self
            .entitlement_repo
            .upsert(UpsertEntitlementEntity {
                user_id,
                is_active: true,
                plan_type: Some(plan.as_str().to_string()),
                subscription_end: Some(now + Duration::days(days)),
                source: EntitlementSource::Admin.as_str().to_string(),
                updated_at: now,
            })
            .await
            .map_err(|err| {
                error!(%actor_id, %user_id, db_error = ?err, "admin: failed to grant entitlement");
                EntitlementError::Internal(err)
            })?;

        info!(
            %actor_id,
            %user_id,
            plan_type = %plan,
            days,
            "admin: entitlement granted"
        );

        Ok(PremiumStatusDto::from_entitlement(Some(&saved), now))
    }

    pub async fn revoke(&self, actor_id: Uuid, user_id: Uuid) -> UseCaseResult<()> {
        self.require(actor_id, Capability::ManageEntitlements).await?;

        let revoked = self
            .entitlement_repo
            .deactivate(user_id)
            .await
            .map_err(|err| {
                error!(%actor_id, %user_id, db_error = ?err, "admin: failed to revoke entitlement");
                EntitlementError::Internal(err)
            })?;

        if !revoked {
            warn!(%actor_id, %user_id, "admin: no entitlement to revoke");
            return Err(EntitlementError::NotFound);
        }

        info!(%actor_id, %user_id, "admin: entitlement revoked");
        Ok(())
    }

    pub async fn payment_record(
        &self,
        actor_id: Uuid,
        payment_request_id: &str,
    ) -> UseCaseResult<PaymentRecordDto> {
        self.require(actor_id, Capability::ViewPaymentRecords).await?;

        self.payment_repo
            .find_by_payment_request_id(payment_request_id)
            .await
            .map_err(|err| {
                error!(
                    %actor_id,
                    %payment_request_id,
                    db_error = ?err,
                    "admin: failed to load payment record"
                );
                EntitlementError::Internal(err)
            })?
            .map(PaymentRecordDto::from)
            .ok_or(EntitlementError::NotFound)
    }

    pub async fn recent_incidents(
        &self,
        actor_id: Uuid,
    ) -> UseCaseResult<Vec<ReconciliationIncidentDto>> {
        self.require(actor_id, Capability::ViewPaymentRecords).await?;

        let incidents = self
            .incident_repo
            .list_recent(RECENT_INCIDENT_LIMIT)
            .await
            .map_err(|err| {
                error!(%actor_id, db_error = ?err, "admin: failed to list incidents");
                EntitlementError::Internal(err)
            })?;

        Ok(incidents
            .into_iter()
            .map(ReconciliationIncidentDto::from)
            .collect())
    }
}

use crate::{auth::AuthUser, usecases::entitlements::EntitlementUseCase};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use skillforge_core::{
    domain::value_objects::entitlements::GrantEntitlementRequest,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            entitlements::EntitlementPostgres, payment_records::PaymentRecordPostgres,
            reconciliation_incidents::ReconciliationIncidentPostgres,
            user_roles::UserRolePostgres,
        },
    },
};
use std::sync::Arc;
use uuid::Uuid;

pub type PostgresEntitlementUseCase = EntitlementUseCase<
    EntitlementPostgres,
    UserRolePostgres,
    PaymentRecordPostgres,
    ReconciliationIncidentPostgres,
>;

pub fn entitlement_usecase(db_pool: Arc<PgPoolSquad>) -> PostgresEntitlementUseCase {
    EntitlementUseCase::new(
        Arc::new(EntitlementPostgres::new(Arc::clone(&db_pool))),
        Arc::new(UserRolePostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentRecordPostgres::new(Arc::clone(&db_pool))),
        Arc::new(ReconciliationIncidentPostgres::new(Arc::clone(&db_pool))),
    )
}

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    Router::new()
        .route("/entitlements/:user_id/grant", post(grant_entitlement))
        .route("/entitlements/:user_id/revoke", post(revoke_entitlement))
        .route("/payments/:payment_request_id", get(payment_record))
        .route("/reconciliation-incidents", get(reconciliation_incidents))
        .with_state(Arc::new(entitlement_usecase(db_pool)))
}

pub async fn grant_entitlement(
    State(usecase): State<Arc<PostgresEntitlementUseCase>>,
    AuthUser { user_id: actor_id, .. }: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(request): Json<GrantEntitlementRequest>,
) -> impl IntoResponse {
    match usecase.grant(actor_id, user_id, request).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn revoke_entitlement(
    State(usecase): State<Arc<PostgresEntitlementUseCase>>,
    AuthUser { user_id: actor_id, .. }: AuthUser,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    match usecase.revoke(actor_id, user_id).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn payment_record(
    State(usecase): State<Arc<PostgresEntitlementUseCase>>,
    AuthUser { user_id: actor_id, .. }: AuthUser,
    Path(payment_request_id): Path<String>,
) -> impl IntoResponse {
    match usecase.payment_record(actor_id, &payment_request_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn reconciliation_incidents(
    State(usecase): State<Arc<PostgresEntitlementUseCase>>,
    AuthUser { user_id: actor_id, .. }: AuthUser,
) -> impl IntoResponse {
    match usecase.recent_incidents(actor_id).await {
        Ok(incidents) => (StatusCode::OK, Json(incidents)).into_response(),
        Err(err) => err.into_response(),
    }
}

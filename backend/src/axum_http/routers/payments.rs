use crate::{
    auth::AuthUser,
    config::config_model::Checkout,
    usecases::payments::{PaymentGateway, PaymentUseCase},
};
use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use skillforge_core::{
    domain::{
        repositories::{
            payment_records::PaymentRecordRepository,
            reconciliation_incidents::ReconciliationIncidentRepository,
        },
        value_objects::payments::{
            CreateCheckoutRequest, VerifyPaymentRequest, WebhookAckResponse,
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            payment_records::PaymentRecordPostgres,
            reconciliation_incidents::ReconciliationIncidentPostgres,
        },
    },
    payments::instamojo_client::InstamojoClient,
};
use std::{collections::HashMap, sync::Arc};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    gateway: Arc<InstamojoClient>,
    checkout: Checkout,
    private_salt: Option<String>,
) -> Router {
    let payment_repository = PaymentRecordPostgres::new(Arc::clone(&db_pool));
    let incident_repository = ReconciliationIncidentPostgres::new(Arc::clone(&db_pool));

    let usecase = PaymentUseCase::new(
        Arc::new(payment_repository),
        Arc::new(incident_repository),
        gateway,
        checkout,
        private_salt,
    );

    router(Arc::new(usecase))
}

pub fn router<P, I, G>(usecase: Arc<PaymentUseCase<P, I, G>>) -> Router
where
    P: PaymentRecordRepository + Send + Sync + 'static,
    I: ReconciliationIncidentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route("/plans", get(list_plans::<P, I, G>))
        .route("/checkout", post(create_checkout::<P, I, G>))
        .route("/verify", post(verify_payment::<P, I, G>))
        .route("/webhook", post(payment_webhook::<P, I, G>))
        .with_state(usecase)
}

pub async fn list_plans<P, I, G>(
    State(usecase): State<Arc<PaymentUseCase<P, I, G>>>,
) -> impl IntoResponse
where
    P: PaymentRecordRepository + Send + Sync + 'static,
    I: ReconciliationIncidentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    Json(usecase.list_plans())
}

pub async fn create_checkout<P, I, G>(
    State(usecase): State<Arc<PaymentUseCase<P, I, G>>>,
    AuthUser { user_id, email, .. }: AuthUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> impl IntoResponse
where
    P: PaymentRecordRepository + Send + Sync + 'static,
    I: ReconciliationIncidentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.create_checkout(user_id, email, request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn verify_payment<P, I, G>(
    State(usecase): State<Arc<PaymentUseCase<P, I, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> impl IntoResponse
where
    P: PaymentRecordRepository + Send + Sync + 'static,
    I: ReconciliationIncidentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.verify_payment(user_id, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Unauthenticated: the processor signs the form instead.
pub async fn payment_webhook<P, I, G>(
    State(usecase): State<Arc<PaymentUseCase<P, I, G>>>,
    Form(fields): Form<HashMap<String, String>>,
) -> impl IntoResponse
where
    P: PaymentRecordRepository + Send + Sync + 'static,
    I: ReconciliationIncidentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.handle_webhook(fields).await {
        Ok(_) => (StatusCode::OK, Json(WebhookAckResponse { success: true })).into_response(),
        Err(err) => err.into_response(),
    }
}

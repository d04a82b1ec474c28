use crate::auth::AuthUser;
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use skillforge_core::infra::db::postgres::postgres_connection::PgPoolSquad;
use std::sync::Arc;

use super::admin::{PostgresEntitlementUseCase, entitlement_usecase};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    Router::new()
        .route("/status", get(premium_status))
        .with_state(Arc::new(entitlement_usecase(db_pool)))
}

pub async fn premium_status(
    State(usecase): State<Arc<PostgresEntitlementUseCase>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse {
    match usecase.premium_status(user_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => err.into_response(),
    }
}

use crate::{
    auth::AuthUser,
    usecases::challenge_grading::{ChallengeGradingUseCase, ScoringOracle},
};
use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use skillforge_core::{
    domain::value_objects::challenge_grades::GradeChallengeRequest,
    grading::oracle_client::GradingOracleClient,
};
use std::sync::Arc;

pub fn routes(oracle: Arc<GradingOracleClient>) -> Router {
    Router::new()
        .route("/grade", post(grade_challenge::<GradingOracleClient>))
        .with_state(Arc::new(ChallengeGradingUseCase::new(oracle)))
}

pub async fn grade_challenge<O>(
    State(usecase): State<Arc<ChallengeGradingUseCase<O>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(request): Json<GradeChallengeRequest>,
) -> impl IntoResponse
where
    O: ScoringOracle + 'static,
{
    match usecase.grade(user_id, request).await {
        Ok(grade) => (StatusCode::OK, Json(grade)).into_response(),
        Err(err) => err.into_response(),
    }
}

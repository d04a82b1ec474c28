use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use skillforge_core::{
    domain::value_objects::challenge_grades::{
        ChallengeGrade, GradeChallengeRequest, parse_oracle_reply,
    },
    grading::oracle_client::{GradingOracleClient, build_grading_prompt},
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::error_response;

const MAX_SUBMISSION_CHARS: usize = 50_000;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> AnyResult<String>;
}

#[async_trait]
impl ScoringOracle for GradingOracleClient {
    async fn complete(&self, prompt: &str) -> AnyResult<String> {
        self.complete(prompt).await
    }
}

#[derive(Debug, Error)]
pub enum GradingError {
    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for GradingError {
    fn into_response(self) -> Response {
        error_response(StatusCode::BAD_REQUEST, self.to_string())
    }
}

pub struct ChallengeGradingUseCase<O>
where
    O: ScoringOracle + 'static,
{
    oracle: Arc<O>,
}

impl<O> ChallengeGradingUseCase<O>
where
    O: ScoringOracle + 'static,
{
    pub fn new(oracle: Arc<O>) -> Self {
        Self { oracle }
    }

    /// Oracle failures of any kind degrade to `ChallengeGrade::fallback()`; only a
    /// malformed request is an error.
    pub async fn grade(
        &self,
        user_id: Uuid,
        request: GradeChallengeRequest,
    ) -> Result<ChallengeGrade, GradingError> {
        let title = required(request.challenge_title, "challengeTitle")?;
        let requirements = required(request.requirements, "requirements")?;
        let submission = required(request.submission, "submission")?;

        if submission.chars().count() > MAX_SUBMISSION_CHARS {
            return Err(GradingError::Validation(format!(
                "submission must be at most {MAX_SUBMISSION_CHARS} characters"
            )));
        }

        let prompt = build_grading_prompt(&title, &requirements, &submission);

        let reply = match self.oracle.complete(&prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%user_id, error = ?err, "challenge_grading: oracle call failed, using fallback");
                return Ok(ChallengeGrade::fallback());
            }
        };

        match parse_oracle_reply(&reply) {
            Ok(grade) => {
                info!(
                    %user_id,
                    score = grade.score,
                    passed = grade.passed,
                    "challenge_grading: submission graded"
                );
                Ok(grade)
            }
            Err(reason) => {
                warn!(
                    %user_id,
                    reason = %reason,
                    "challenge_grading: oracle reply unusable, using fallback"
                );
                Ok(ChallengeGrade::fallback())
            }
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, GradingError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| GradingError::Validation(format!("{field} is required")))
}

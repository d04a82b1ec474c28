use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PASSING_SCORE: u8 = 70;
pub const FALLBACK_FEEDBACK: &str =
    "We couldn't grade this submission automatically. Your work was saved; please try again later.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeChallengeRequest {
    pub challenge_title: Option<String>,
    pub requirements: Option<String>,
    pub submission: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeGrade {
    pub score: u8,
    pub passed: bool,
    pub feedback: String,
    /// `false` when the oracle could not be used and the fallback was returned.
    pub graded: bool,
}

impl ChallengeGrade {
    pub fn fallback() -> Self {
        Self {
            score: 0,
            passed: false,
            feedback: FALLBACK_FEEDBACK.to_string(),
            graded: false,
        }
    }

    fn from_score(score: f64, feedback: String) -> Self {
        let score = score.clamp(0.0, 100.0).round() as u8;
        Self {
            score,
            passed: score >= PASSING_SCORE,
            feedback,
            graded: true,
        }
    }
}

/// Why an oracle reply could not be turned into a grade. Expected, not exceptional.
#[derive(Debug, Error, PartialEq)]
pub enum GradeParseFailure {
    #[error("no JSON object found in oracle reply")]
    NoJsonObject,
    #[error("oracle JSON is malformed: {0}")]
    MalformedJson(String),
    #[error("oracle JSON has no numeric score")]
    MissingScore,
}

#[derive(Debug, Deserialize)]
struct OracleGradePayload {
    score: Option<serde_json::Value>,
    #[serde(default)]
    feedback: Option<String>,
}

/// Extracts the `{score, feedback}` object embedded in free-form oracle text.
pub fn parse_oracle_reply(text: &str) -> Result<ChallengeGrade, GradeParseFailure> {
    let start = text.find('{').ok_or(GradeParseFailure::NoJsonObject)?;
    let end = text.rfind('}').ok_or(GradeParseFailure::NoJsonObject)?;
    if end < start {
        return Err(GradeParseFailure::NoJsonObject);
    }

    let payload: OracleGradePayload = serde_json::from_str(&text[start..=end])
        .map_err(|err| GradeParseFailure::MalformedJson(err.to_string()))?;

    let score = match payload.score {
        Some(serde_json::Value::Number(number)) => number.as_f64(),
        Some(serde_json::Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|score| score.is_finite())
    .ok_or(GradeParseFailure::MissingScore)?;

    let feedback = payload
        .feedback
        .map(|feedback| feedback.trim().to_string())
        .filter(|feedback| !feedback.is_empty())
        .unwrap_or_else(|| "No feedback provided.".to_string());

    Ok(ChallengeGrade::from_score(score, feedback))
}

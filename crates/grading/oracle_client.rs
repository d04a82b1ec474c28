use std::time::Duration;

use anyhow::{Result, bail};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

/// Thin client for the text-completion endpoint used to grade project challenges.
/// The reply is free-form text and is parsed by the caller.
pub struct GradingOracleClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    text: Option<String>,
}

impl GradingOracleClient {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_url,
            api_key,
        })
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let resp = self
            .http
            .post(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&json!({ "prompt": prompt }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            warn!(
                status = %status,
                response_body = %body,
                "grading_oracle: completion request failed"
            );
            bail!("grading oracle returned status {}", status);
        }

        // Some deployments wrap the text in `{"text": ...}`, others return it bare.
        Ok(match serde_json::from_str::<CompletionReply>(&body) {
            Ok(CompletionReply { text: Some(text) }) => text,
            _ => body,
        })
    }
}

pub fn build_grading_prompt(title: &str, requirements: &str, submission: &str) -> String {
    format!(
        "You are grading a project challenge on a coding-education platform.\n\
         Challenge: {title}\n\
         Requirements:\n{requirements}\n\n\
         Learner submission:\n```\n{submission}\n```\n\n\
         Reply with a JSON object of the form {{\"score\": <0-100>, \"feedback\": \"<two or three sentences>\"}}."
    )
}

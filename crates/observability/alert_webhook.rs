use super::notifier::{AlertEvent, AlertSink};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

const CONTENT_LIMIT: usize = 2000;

/// Posts alerts to a chat-style incoming webhook as `{"content": "..."}`.
pub(crate) struct AlertWebhookSink {
    webhook_url: Url,
    client: Client,
}

impl AlertWebhookSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|_| anyhow!("alert webhook client could not be built"))?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn format_content(event: &AlertEvent) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "**{}** `{}` `{}` `{}`",
        event.service_name,
        event.environment,
        event.component,
        event.level.as_str()
    ));

    lines.push(format!(
        "`{}` `{}`",
        event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        event.target
    ));

    if let Some(message) = event.message.as_ref().filter(|m| !m.trim().is_empty()) {
        lines.push(format!("> {}", message.trim()));
    }

    if !event.spans.is_empty() {
        let chain = event
            .spans
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
        lines.push(format!("spans: `{chain}`"));
    }

    for (k, v) in &event.fields {
        lines.push(format!("- `{k}` = `{v}`"));
    }

    for span in event.spans.iter().filter(|s| !s.fields.is_empty()) {
        lines.push(format!("span `{}`:", span.name));
        for (k, v) in &span.fields {
            lines.push(format!("- `{k}` = `{v}`"));
        }
    }

    truncate(lines.join("\n"))
}

#[async_trait]
impl AlertSink for AlertWebhookSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": format_content(event) }))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn sink_name(&self) -> &'static str {
        "alert_webhook"
    }
}

// reqwest errors print the full URL, which carries the webhook token.
fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("alert webhook request timed out");
    }
    if error.is_connect() {
        return anyhow!("alert webhook connection failed");
    }
    anyhow!("alert webhook request failed")
}

fn truncate(content: String) -> String {
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }

    let allowed = CONTENT_LIMIT.saturating_sub(SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::notifier::SpanSummary;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tracing::Level;

    #[test]
    fn content_lists_message_fields_and_span_chain() {
        let event = AlertEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "skillforge".to_string(),
            environment: "prod".to_string(),
            component: "backend".to_string(),
            target: "backend::usecases::payments".to_string(),
            message: Some("payment_reconcile: completion failed".to_string()),
            fields: BTreeMap::from([("payment_request_id".to_string(), "PR1".to_string())]),
            spans: vec![SpanSummary {
                name: "request".to_string(),
                fields: BTreeMap::from([("uri".to_string(), "/api/v1/payments/verify".to_string())]),
            }],
        };

        let content = format_content(&event);

        assert!(content.starts_with("**skillforge** `prod` `backend` `ERROR`"));
        assert!(content.contains("> payment_reconcile: completion failed"));
        assert!(content.contains("- `payment_request_id` = `PR1`"));
        assert!(content.contains("spans: `request`"));
    }

    #[test]
    fn long_content_is_truncated_to_the_limit() {
        let content = truncate("x".repeat(CONTENT_LIMIT + 50));

        assert_eq!(content.chars().count(), CONTENT_LIMIT);
        assert!(content.ends_with("(truncated)"));
    }
}

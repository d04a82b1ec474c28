use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

/// Remote status string the processor uses for a fully paid payment request.
pub const REMOTE_COMPLETED_STATUS: &str = "Completed";
/// Webhook `status` value for a successful payment.
pub const WEBHOOK_SUCCESS_STATUS: &str = "Credit";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway request failed: {context} (status {status})")]
    Api {
        context: &'static str,
        status: u16,
        body: String,
    },
    #[error("payment gateway unreachable: {context}")]
    Transport {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("payment gateway response could not be read: {context}: {reason}")]
    Decode {
        context: &'static str,
        reason: String,
    },
    #[error("payment gateway request not sent: {context}: {reason}")]
    InvalidRequest {
        context: &'static str,
        reason: String,
    },
}

const MAX_PAYMENT_REQUEST_ID_LEN: usize = 64;

/// Processor ids are short ASCII alphanumerics. Anything else is rejected before it
/// can be placed in a request path.
pub fn is_well_formed_payment_request_id(payment_request_id: &str) -> bool {
    !payment_request_id.is_empty()
        && payment_request_id.len() <= MAX_PAYMENT_REQUEST_ID_LEN
        && payment_request_id.bytes().all(|byte| byte.is_ascii_alphanumeric())
}

/// Minimal Instamojo payment-request client built on reqwest.
pub struct InstamojoClient {
    http: reqwest::Client,
    api_base_url: String,
    api_key: String,
    auth_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePaymentRequestInput {
    /// Major units with two decimals, e.g. `"299.00"`.
    pub amount: String,
    pub purpose: String,
    pub buyer_name: String,
    pub email: String,
    pub redirect_url: String,
    pub webhook_url: String,
    pub allow_repeated_payments: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPaymentRequest {
    pub payment_request_id: String,
    pub checkout_url: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemotePaymentRequest {
    pub payment_request_id: String,
    pub status: String,
    /// Transaction id of the first successful payment, when the processor lists one.
    pub payment_id: Option<String>,
    pub raw: Value,
}

impl RemotePaymentRequest {
    pub fn is_completed(&self) -> bool {
        self.status == REMOTE_COMPLETED_STATUS
    }

    pub fn is_failed(&self) -> bool {
        self.status == "Failed"
    }
}

#[derive(Debug, Deserialize)]
struct PaymentRequestEnvelope {
    success: Option<bool>,
    payment_request: Option<PaymentRequestObject>,
}

#[derive(Debug, Deserialize)]
struct PaymentRequestObject {
    id: String,
    status: Option<String>,
    longurl: Option<String>,
    #[serde(default)]
    payments: Vec<PaymentObject>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PaymentObject {
    Detailed {
        payment_id: String,
        status: Option<String>,
    },
    // Older API versions list payment URLs instead of objects.
    Reference(String),
}

impl InstamojoClient {
    pub fn new(
        api_base_url: String,
        api_key: String,
        auth_token: String,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GatewayError::Transport {
                context: "build http client",
                source,
            })?;

        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_key,
            auth_token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &'static str,
    ) -> Result<Value, GatewayError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|source| GatewayError::Transport { context, source })?;

        if !status.is_success() {
            let body = if body.is_empty() {
                "<empty response body>".to_string()
            } else {
                body
            };

            error!(
                status = %status,
                response_body = %body,
                context = %context,
                "instamojo api request failed"
            );

            return Err(GatewayError::Api {
                context,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<Value>(&body).map_err(|err| GatewayError::Decode {
            context,
            reason: err.to_string(),
        })
    }

    fn parse_payment_request(
        raw: &Value,
        context: &'static str,
    ) -> Result<PaymentRequestObject, GatewayError> {
        let envelope: PaymentRequestEnvelope =
            serde_json::from_value(raw.clone()).map_err(|err| GatewayError::Decode {
                context,
                reason: err.to_string(),
            })?;

        if envelope.success == Some(false) {
            return Err(GatewayError::Api {
                context,
                status: 200,
                body: raw.to_string(),
            });
        }

        envelope.payment_request.ok_or_else(|| GatewayError::Decode {
            context,
            reason: "payment_request is missing".to_string(),
        })
    }

    /// Creates a hosted payment request and returns its id and checkout URL.
    pub async fn create_payment_request(
        &self,
        input: &CreatePaymentRequestInput,
    ) -> Result<CreatedPaymentRequest, GatewayError> {
        const CONTEXT: &str = "create payment request";

        let body = [
            ("amount", input.amount.clone()),
            ("purpose", input.purpose.clone()),
            ("buyer_name", input.buyer_name.clone()),
            ("email", input.email.clone()),
            ("redirect_url", input.redirect_url.clone()),
            ("webhook", input.webhook_url.clone()),
            (
                "allow_repeated_payments",
                input.allow_repeated_payments.to_string(),
            ),
            ("send_email", "false".to_string()),
        ];

        let resp = self
            .http
            .post(self.endpoint("payment-requests/"))
            .header("X-Api-Key", &self.api_key)
            .header("X-Auth-Token", &self.auth_token)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                context: CONTEXT,
                source,
            })?;
        let raw = Self::ensure_success(resp, CONTEXT).await?;

        let payment_request = Self::parse_payment_request(&raw, CONTEXT)?;
        let checkout_url = payment_request.longurl.ok_or_else(|| GatewayError::Decode {
            context: CONTEXT,
            reason: "checkout url (longurl) is missing".to_string(),
        })?;

        Ok(CreatedPaymentRequest {
            payment_request_id: payment_request.id,
            checkout_url,
            raw,
        })
    }

    /// Fetches the current remote state of a payment request.
    pub async fn get_payment_request(
        &self,
        payment_request_id: &str,
    ) -> Result<RemotePaymentRequest, GatewayError> {
        const CONTEXT: &str = "get payment request";

        if !is_well_formed_payment_request_id(payment_request_id) {
            return Err(GatewayError::InvalidRequest {
                context: CONTEXT,
                reason: "payment request id is not alphanumeric".to_string(),
            });
        }

        let resp = self
            .http
            .get(self.endpoint(&format!("payment-requests/{}/", payment_request_id)))
            .header("X-Api-Key", &self.api_key)
            .header("X-Auth-Token", &self.auth_token)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                context: CONTEXT,
                source,
            })?;
        let raw = Self::ensure_success(resp, CONTEXT).await?;

        let payment_request = Self::parse_payment_request(&raw, CONTEXT)?;
        let payment_id = payment_request.payments.iter().find_map(|payment| match payment {
            PaymentObject::Detailed { payment_id, status } => (status.as_deref()
                == Some(WEBHOOK_SUCCESS_STATUS))
            .then(|| payment_id.clone()),
            PaymentObject::Reference(_) => None,
        });

        Ok(RemotePaymentRequest {
            payment_request_id: payment_request.id,
            status: payment_request.status.unwrap_or_default(),
            payment_id,
            raw,
        })
    }
}

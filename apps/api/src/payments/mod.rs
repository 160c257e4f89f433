/// Stripe client: the single point of entry for payment-processor calls.
///
/// Only PaymentIntents are used. The browser confirms the intent with the
/// returned client secret; the outcome arrives through the webhook.
use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub mod handlers;
pub mod webhook;

const STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const CURRENCY: &str = "usd";
/// Metadata key linking a PaymentIntent back to its analysis record.
pub const ANALYSIS_ID_METADATA_KEY: &str = "analysisId";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stripe API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stripe response is missing '{0}'")]
    MissingField(&'static str),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Malformed webhook event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// The analysis this intent pays for, if the metadata carries one.
    pub fn analysis_id(&self) -> Option<Uuid> {
        self.metadata
            .get(ANALYSIS_ID_METADATA_KEY)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

#[derive(Debug, Deserialize)]
struct StripeError {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self::with_base_url(secret_key, STRIPE_API_BASE)
    }

    pub fn with_base_url(secret_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            secret_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a PaymentIntent for one analysis. `amount` is in cents.
    pub async fn create_payment_intent(
        &self,
        amount: u64,
        analysis_id: Uuid,
    ) -> Result<PaymentIntent, PaymentError> {
        let amount = amount.to_string();
        let analysis_id = analysis_id.to_string();
        let metadata_key = format!("metadata[{ANALYSIS_ID_METADATA_KEY}]");
        let form = [
            ("amount", amount.as_str()),
            ("currency", CURRENCY),
            ("automatic_payment_methods[enabled]", "true"),
            (metadata_key.as_str(), analysis_id.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let intent: PaymentIntent = response.json().await?;
        debug!("Created payment intent {} for analysis {}", intent.id, analysis_id);
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_payment_intent_posts_form() {
        let server = MockServer::start().await;
        let analysis_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header_exists("authorization"))
            .and(body_string_contains("amount=1000"))
            .and(body_string_contains("currency=usd"))
            .and(body_string_contains(analysis_id.to_string().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_123",
                "client_secret": "pi_123_secret_abc",
                "status": "requires_payment_method",
                "metadata": { "analysisId": analysis_id.to_string() }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stripe = StripeClient::with_base_url("sk_test".to_string(), server.uri());
        let intent = stripe.create_payment_intent(1000, analysis_id).await.unwrap();
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
        assert_eq!(intent.analysis_id(), Some(analysis_id));
    }

    #[tokio::test]
    async fn test_stripe_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": { "message": "Your card was declined." }
            })))
            .mount(&server)
            .await;

        let stripe = StripeClient::with_base_url("sk_test".to_string(), server.uri());
        let err = stripe
            .create_payment_intent(1000, Uuid::new_v4())
            .await
            .unwrap_err();
        match err {
            PaymentError::Api { status, message } => {
                assert_eq!(status, 402);
                assert_eq!(message, "Your card was declined.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_analysis_id_requires_valid_uuid() {
        let intent: PaymentIntent = serde_json::from_value(json!({
            "id": "pi_1",
            "metadata": { "analysisId": "42" }
        }))
        .unwrap();
        assert_eq!(intent.analysis_id(), None);
    }
}

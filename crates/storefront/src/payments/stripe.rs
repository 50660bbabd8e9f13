//! Stripe payment intents over the REST API.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::{PaymentError, PaymentIntent, PaymentIntentRequest, PaymentIntentStatus, PaymentProcessor};
use crate::config::PaymentsConfig;

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_url: String,
    secret_key: Option<SecretString>,
}

impl StripeClient {
    /// Create a new client. Without a secret key every call fails with
    /// [`PaymentError::NotConfigured`].
    #[must_use]
    pub fn new(config: &PaymentsConfig) -> Self {
        if config.secret_key.is_none() {
            tracing::warn!("Stripe secret key is not configured, card payments are disabled");
        }

        Self {
            inner: Arc::new(StripeClientInner {
                client: reqwest::Client::new(),
                api_url: config.api_url.trim_end_matches('/').to_string(),
                secret_key: config.secret_key.clone(),
            }),
        }
    }

    fn secret(&self) -> Result<&str, PaymentError> {
        self.inner
            .secret_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or(PaymentError::NotConfigured)
    }

    async fn parse(response: reqwest::Response) -> Result<IntentResponse, PaymentError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| text.chars().take(200).collect());
            tracing::error!(status = %status, message = %message, "Stripe API returned non-success status");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

/// Form fields for `POST /v1/payment_intents`.
fn intent_form(request: &PaymentIntentRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), request.amount.to_string()),
        (
            "currency".to_string(),
            request.currency.processor_code().to_string(),
        ),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    form.extend(
        request
            .metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
    );
    form
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    #[instrument(skip(self, request), fields(amount = request.amount, currency = ?request.currency))]
    async fn create_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent, PaymentError> {
        let secret = self.secret()?;
        let url = format!("{}/v1/payment_intents", self.inner.api_url);

        let mut builder = self
            .inner
            .client
            .post(&url)
            .bearer_auth(secret)
            .form(&intent_form(request));
        if let Some(key) = &request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let intent = Self::parse(builder.send().await?).await?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| PaymentError::Parse("payment intent has no client_secret".to_string()))?;

        tracing::info!(payment_intent_id = %intent.id, "Payment intent created");
        Ok(PaymentIntent {
            id: intent.id,
            client_secret,
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntentStatus, PaymentError> {
        if intent_id.is_empty()
            || !intent_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(PaymentError::InvalidIntentId(intent_id.to_string()));
        }
        let secret = self.secret()?;
        let url = format!("{}/v1/payment_intents/{intent_id}", self.inner.api_url);

        let response = self.inner.client.get(&url).bearer_auth(secret).send().await?;
        let intent = Self::parse(response).await?;
        Ok(PaymentIntentStatus::from_wire(&intent.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use threadline_core::CurrencyCode;

    #[test]
    fn test_intent_form_fields() {
        let mut metadata = BTreeMap::new();
        metadata.insert("items_count".to_string(), "3".to_string());
        let request = PaymentIntentRequest {
            amount: 250_000,
            currency: CurrencyCode::PKR,
            metadata,
            idempotency_key: None,
        };

        let form = intent_form(&request);
        assert!(form.contains(&("amount".to_string(), "250000".to_string())));
        assert!(form.contains(&("currency".to_string(), "pkr".to_string())));
        assert!(form.contains(&("automatic_payment_methods[enabled]".to_string(), "true".to_string())));
        assert!(form.contains(&("metadata[items_count]".to_string(), "3".to_string())));
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses() {
        let client = StripeClient::new(&PaymentsConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            secret_key: None,
            publishable_key: None,
        });

        let result = client.retrieve_intent("pi_123").await;
        assert!(matches!(result, Err(PaymentError::NotConfigured)));

        let result = client.retrieve_intent("pi_1/../refunds").await;
        assert!(matches!(result, Err(PaymentError::InvalidIntentId(_))));
    }
}

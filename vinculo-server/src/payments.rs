//! Payment provider client
//!
//! [`PaymentProvider`] is the seam between checkout/verification logic and the
//! provider. [`StripeProvider`] talks to the Checkout Sessions REST API; tests swap in
//! an in-memory implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use vinculo_common::access::ProductCode;

const USER_AGENT: &str = concat!("vinculo-server/", env!("CARGO_PKG_VERSION"));

/// Payment provider errors
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Checkout session not found: {0}")]
    SessionNotFound(String),
}

/// Checkout session to create
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub product: ProductCode,
    pub price_id: String,
    pub email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Created checkout session
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page
    pub url: Option<String>,
}

/// Checkout session as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub id: String,
    pub paid: bool,
    /// Product code carried in the session metadata
    pub product: Option<ProductCode>,
    pub email: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession, PaymentError>;
}

/// Checkout Sessions API response (fields we use)
#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    customer_email: Option<String>,
    customer_details: Option<StripeCustomerDetails>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomerDetails {
    email: Option<String>,
}

impl StripeSession {
    fn into_payment_session(self) -> PaymentSession {
        let paid = matches!(
            self.payment_status.as_deref(),
            Some("paid") | Some("no_payment_required")
        );
        let product = self.metadata.get("product").and_then(|p| p.parse().ok());
        let email = self
            .customer_details
            .and_then(|d| d.email)
            .or(self.customer_email);

        PaymentSession {
            id: self.id,
            paid,
            product,
            email,
        }
    }
}

/// Stripe-compatible HTTP client
pub struct StripeProvider {
    http_client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeProvider {
    pub fn new(api_base: &str, secret_key: &str, timeout: Duration) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    async fn parse_response(
        response: reqwest::Response,
        session_id: Option<&str>,
    ) -> Result<StripeSession, PaymentError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::SessionNotFound(
                session_id.unwrap_or_default().to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api(status.as_u16(), body));
        }

        response
            .json::<StripeSession>()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let mut params = vec![
            ("mode", "payment".to_string()),
            ("line_items[0][price]", request.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("metadata[product]", request.product.as_str().to_string()),
        ];
        if let Some(email) = &request.email {
            params.push(("customer_email", email.clone()));
        }

        tracing::debug!(product = %request.product, "Creating checkout session");

        let response = self
            .http_client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let session = Self::parse_response(response, None).await?;
        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession, PaymentError> {
        tracing::debug!(session_id, "Retrieving checkout session");

        // Caller-supplied id: must stay a single path segment under the sessions resource
        if matches!(session_id, "" | "." | "..") {
            return Err(PaymentError::SessionNotFound(session_id.to_string()));
        }
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.api_base,
            urlencoding::encode(session_id)
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let session = Self::parse_response(response, Some(session_id)).await?;
        Ok(session.into_payment_session())
    }
}

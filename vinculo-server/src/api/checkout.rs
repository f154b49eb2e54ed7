//! Checkout endpoints
//!
//! Checkout creation needs the provider secret and a price id per product; either
//! one missing is a configuration error returned to the caller as a 500.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use vinculo_common::access::{normalise_email, IdentityKey, PaymentStatus, ProductCode};

use super::identity::identity_cookie;
use crate::error::{ApiError, ApiResult};
use crate::payments::CheckoutRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub product: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCheckoutRequest {
    pub session_id: String,
}

/// POST /api/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> ApiResult<Response> {
    let product: ProductCode = request.product.parse()?;

    let payments = state
        .gate
        .payments()
        .ok_or_else(|| ApiError::Config("payment provider is not configured".to_string()))?;
    let price_id = state.config.payments.price_for(product)?.to_string();

    let base = state.config.public_base_url.trim_end_matches('/');
    let checkout = CheckoutRequest {
        product,
        price_id,
        email: request.email.as_deref().and_then(normalise_email),
        success_url: format!(
            "{}/resultado?tier={}&session_id={{CHECKOUT_SESSION_ID}}",
            base,
            product.tier()
        ),
        cancel_url: format!("{}/resultado?tier={}", base, product.tier()),
    };

    let session = payments.create_checkout(&checkout).await?;
    info!(session_id = %session.id, product = %product, "Checkout session created");

    Ok((StatusCode::CREATED, Json(session)).into_response())
}

/// POST /api/checkout/verify
///
/// Called by the success page. Sets the identity cookie once the payment is known.
pub async fn verify_checkout(
    State(state): State<AppState>,
    Json(request): Json<VerifyCheckoutRequest>,
) -> ApiResult<Response> {
    let outcome = state
        .gate
        .verify_and_record(&request.session_id, PaymentStatus::Paid)
        .await?;

    let mut response = Json(json!({
        "session_id": request.session_id.trim(),
        "result": outcome,
    }))
    .into_response();

    if outcome.tier().is_some() {
        if let Some(cookie) = IdentityKey::session(&request.session_id)
            .as_ref()
            .and_then(identity_cookie)
        {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
    }

    Ok(response)
}

//! Payment provider webhook
//!
//! The payload is only used to learn the session id. Payment state is always
//! re-read from the provider by the gate, so a forged callback cannot grant access.
//! Errors talking to the provider return 502 so the provider retries delivery.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use vinculo_common::access::PaymentStatus;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

const HANDLED_EVENTS: [&str; 2] = [
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: Value,
}

/// POST /api/webhooks/payment
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(event): Json<WebhookEvent>,
) -> ApiResult<Json<Value>> {
    if !HANDLED_EVENTS.contains(&event.event_type.as_str()) {
        debug!(event_type = %event.event_type, "Ignoring webhook event");
        return Ok(Json(json!({ "received": true, "ignored": true })));
    }

    let session_id = event
        .data
        .as_ref()
        .and_then(|d| d.object.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("webhook event has no session id".to_string()))?;

    let outcome = state
        .gate
        .verify_and_record(session_id, PaymentStatus::Completed)
        .await?;

    Ok(Json(json!({ "received": true, "result": outcome })))
}

//! Event tracking endpoint
//!
//! Always answers 204. The body is parsed leniently and anything outside the
//! allow-list is dropped; storage happens in a background task.

use axum::{body::Bytes, extract::State, http::HeaderMap, http::StatusCode};
use tracing::debug;
use vinculo_common::db::record_event;
use vinculo_common::tracking::{validate_event, RawEvent};

use super::identity::client_ip;
use crate::AppState;

/// POST /api/events
pub async fn track_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let Ok(raw) = serde_json::from_slice::<RawEvent>(&body) else {
        debug!("Dropping unparseable event");
        return StatusCode::NO_CONTENT;
    };
    let Some(event) = validate_event(raw) else {
        debug!("Dropping event outside allow-list");
        return StatusCode::NO_CONTENT;
    };

    let ip = client_ip(&headers);
    tokio::spawn(async move {
        let country = state.geo.country_for(&event.session_id, ip).await;
        if let Err(e) = record_event(&state.db, &event, country.as_deref()).await {
            debug!(error = %e, event = event.name.as_str(), "Failed to record event");
        }
    });

    StatusCode::NO_CONTENT
}

//! Lead capture endpoint
//!
//! Stores the lead locally; syncing to the mailing-list provider happens elsewhere.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use vinculo_common::db::{save_lead, InsertOutcome, NewLead};
use vinculo_common::ProductTier;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LeadRequest {
    pub email: String,
    pub source: Option<String>,
    pub tier: Option<ProductTier>,
    pub score: Option<u8>,
}

/// POST /api/leads
pub async fn capture_lead(
    State(state): State<AppState>,
    Json(request): Json<LeadRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let lead = NewLead {
        email: request.email,
        source: request.source,
        tier: request.tier,
        score: request.score.map(|s| s.min(100)),
    };

    let outcome = save_lead(&state.db, &lead).await?;
    let status = match outcome {
        InsertOutcome::Inserted => {
            info!(source = ?lead.source, "Lead captured");
            StatusCode::CREATED
        }
        InsertOutcome::AlreadyRecorded => StatusCode::OK,
    };

    Ok((status, Json(json!({ "captured": true }))))
}

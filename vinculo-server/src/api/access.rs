//! Access level endpoint

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use vinculo_common::access::{resolve_identity, AccessLevel};

use super::identity::cached_identity;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AccessQuery {
    pub email: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub access: AccessLevel,
}

/// GET /api/access
///
/// Never errors: lookups that fail or time out report `none`.
pub async fn get_access(
    State(state): State<AppState>,
    Query(query): Query<AccessQuery>,
    headers: HeaderMap,
) -> Json<AccessResponse> {
    let identity = resolve_identity(
        query.session_id.as_deref(),
        query.email.as_deref(),
        cached_identity(&headers),
    );
    let decision = state.gate.check_access(identity).await;

    Json(AccessResponse {
        access: decision.level,
    })
}

//! Report endpoint
//!
//! Scores the submitted answers, classifies them and gates the result:
//! visitors with the right access get the full report (and a snapshot is stored),
//! everyone else gets a teaser with the band only.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{info, warn};
use vinculo_common::access::{gate, resolve_identity, AccessLevel, GateOutcome, ProductCode};
use vinculo_common::db::{save_snapshot, NewSnapshot};
use vinculo_common::diagnostic::{classify, summary_text, ColorTag, DiagnosticBand, DiagnosticState};
use vinculo_common::scoring::DimensionScore;
use vinculo_common::{compute_long_scores, compute_short_score, AnswerSet, Dimension, ProductTier};

use super::identity::cached_identity;
use crate::error::ApiResult;
use crate::gate::AccessDecision;
use crate::AppState;

/// POST body for a report request
#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    /// Flat question-id -> value object
    #[serde(default)]
    pub answers: Option<Value>,
    pub email: Option<String>,
    pub session_id: Option<String>,
    /// Client id for this run; repeated submissions store one snapshot
    pub submission_id: Option<String>,
}

/// Scores computed for a tier
#[derive(Debug, Clone)]
pub struct ComputedResult {
    pub tier: ProductTier,
    pub score: u8,
    pub state: DiagnosticState,
    pub dimensions: Option<Vec<DimensionScore>>,
    pub focus_dimension: Option<Dimension>,
    pub answered: usize,
    pub total_questions: usize,
}

impl ComputedResult {
    pub fn compute(tier: ProductTier, answers: &AnswerSet) -> Self {
        let answered = answers.answered_count(tier);
        let total_questions = tier.question_ids().len();

        match tier {
            ProductTier::Quick => {
                let score = compute_short_score(answers);
                Self {
                    tier,
                    score,
                    state: classify(score),
                    dimensions: None,
                    focus_dimension: None,
                    answered,
                    total_questions,
                }
            }
            ProductTier::Deep => {
                let scores = compute_long_scores(answers);
                let focus_dimension = scores.weakest_dimension().map(|d| d.dimension);
                Self {
                    tier,
                    score: scores.global,
                    state: scores.global_state,
                    dimensions: Some(scores.dimensions),
                    focus_dimension,
                    answered,
                    total_questions,
                }
            }
        }
    }

    /// Dimension breakdown as stored with snapshots: `{dimension_id: score}`
    fn dimensions_json(&self) -> Option<Value> {
        self.dimensions.as_ref().map(|dims| {
            let map: Map<String, Value> = dims
                .iter()
                .map(|d| (d.dimension.id().to_string(), Value::from(d.score)))
                .collect();
            Value::Object(map)
        })
    }
}

/// Full report for authorized visitors
#[derive(Debug, Serialize)]
pub struct FullReport {
    pub tier: ProductTier,
    pub score: u8,
    pub summary: String,
    pub state: DiagnosticState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<DimensionScore>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_dimension: Option<Dimension>,
    pub answered: usize,
    pub total_questions: usize,
    /// Stored snapshot, absent if persistence failed
    pub snapshot_id: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Teaser shown behind the paywall
#[derive(Debug, Serialize)]
pub struct PaywallTeaser {
    pub tier: ProductTier,
    pub band: DiagnosticBand,
    pub label: &'static str,
    pub color: ColorTag,
    pub answered: usize,
    pub total_questions: usize,
    /// Product to offer at checkout
    pub offer: ProductCode,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReportResponse {
    FullReport(FullReport),
    Paywall(PaywallTeaser),
}

/// GET /api/report/:tier with answers and identity in the query string
pub async fn get_report(
    State(state): State<AppState>,
    Path(tier): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Json<ReportResponse>> {
    let tier: ProductTier = tier.parse()?;
    let answers = AnswerSet::from_query(&query);

    let request = ReportRequest {
        answers: None,
        email: query.get("email").cloned(),
        session_id: query.get("session_id").cloned(),
        submission_id: query.get("submission_id").cloned(),
    };

    Ok(Json(render_report(&state, tier, answers, &request, &headers).await))
}

/// POST /api/report/:tier with a JSON body
pub async fn post_report(
    State(state): State<AppState>,
    Path(tier): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let tier: ProductTier = tier.parse()?;
    let answers = match &request.answers {
        Some(value) => AnswerSet::from_json(value)?,
        None => AnswerSet::new(),
    };

    Ok(Json(render_report(&state, tier, answers, &request, &headers).await))
}

async fn render_report(
    state: &AppState,
    tier: ProductTier,
    answers: AnswerSet,
    request: &ReportRequest,
    headers: &HeaderMap,
) -> ReportResponse {
    let identity = resolve_identity(
        request.session_id.as_deref(),
        request.email.as_deref(),
        cached_identity(headers),
    );
    let decision = state.gate.check_access(identity).await;
    let computed = ComputedResult::compute(tier, &answers);

    match gate(tier, decision.level) {
        GateOutcome::Paywall => {
            info!(tier = %tier, level = %decision.level, resolution = ?decision.resolution, "Serving paywall");
            ReportResponse::Paywall(teaser(&computed, decision.level))
        }
        GateOutcome::FullReport => {
            let snapshot_id = store_snapshot(state, &computed, answers, request, &decision).await;
            ReportResponse::FullReport(FullReport {
                tier,
                score: computed.score,
                summary: summary_text(computed.score),
                state: computed.state,
                dimensions: computed.dimensions,
                focus_dimension: computed.focus_dimension,
                answered: computed.answered,
                total_questions: computed.total_questions,
                snapshot_id,
                generated_at: Utc::now(),
            })
        }
    }
}

fn teaser(computed: &ComputedResult, level: AccessLevel) -> PaywallTeaser {
    let offer = match (computed.tier, level) {
        (ProductTier::Deep, AccessLevel::Quick) => ProductCode::Upgrade,
        (ProductTier::Deep, _) => ProductCode::Deep,
        (ProductTier::Quick, _) => ProductCode::Quick,
    };

    PaywallTeaser {
        tier: computed.tier,
        band: computed.state.band,
        label: computed.state.label,
        color: computed.state.color,
        answered: computed.answered,
        total_questions: computed.total_questions,
        offer,
    }
}

/// Persist the run; failures are logged and never block the report
async fn store_snapshot(
    state: &AppState,
    computed: &ComputedResult,
    answers: AnswerSet,
    request: &ReportRequest,
    decision: &AccessDecision,
) -> Option<String> {
    let snapshot = NewSnapshot {
        submission_id: request.submission_id.clone(),
        tier: computed.tier,
        score: computed.score,
        band: computed.state.band,
        dimensions: computed.dimensions_json(),
        answers,
        identity: decision.identity.as_ref().map(|i| i.to_cookie_value()),
    };

    match save_snapshot(&state.db, &snapshot).await {
        Ok(saved) => {
            info!(guid = %saved.guid, outcome = ?saved.outcome, "Result snapshot stored");
            Some(saved.guid)
        }
        Err(e) => {
            warn!(error = %e, tier = %computed.tier, "Failed to store result snapshot");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_result_has_no_dimensions() {
        let answers = AnswerSet::from_pairs(
            ProductTier::Quick.question_ids().into_iter().map(|id| (id, "4")),
        );
        let computed = ComputedResult::compute(ProductTier::Quick, &answers);
        assert_eq!(computed.score, 75);
        assert_eq!(computed.answered, 7);
        assert!(computed.dimensions_json().is_none());
    }

    #[test]
    fn test_deep_dimensions_json() {
        let answers = AnswerSet::from_pairs([("tru_1", "4"), ("tru_2", "5"), ("tru_3", "3"), ("tru_4", "4")]);
        let computed = ComputedResult::compute(ProductTier::Deep, &answers);
        let json = computed.dimensions_json().unwrap();

        assert_eq!(json["trust"], 75);
        assert_eq!(json["communication"], 0);
        assert_eq!(computed.focus_dimension, Some(Dimension::Trust));
        assert_eq!(computed.total_questions, 22);
    }

    #[test]
    fn test_teaser_offers_upgrade_to_quick_buyers() {
        let computed = ComputedResult::compute(ProductTier::Deep, &AnswerSet::new());
        assert_eq!(teaser(&computed, AccessLevel::Quick).offer, ProductCode::Upgrade);
        assert_eq!(teaser(&computed, AccessLevel::None).offer, ProductCode::Deep);
    }
}

//! Integration tests for vinculo-server API endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Report gating (full report vs paywall) for quick and deep tiers
//! - Identity priority (explicit request identity vs cached cookie)
//! - Checkout creation and configuration errors
//! - Idempotent verify-and-record via the verify endpoint and the webhook
//! - Lead capture
//! - Event tracking never failing
//!
//! All tests run against an in-memory SQLite database and a mock payment provider.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt; // for `oneshot` method
use vinculo_common::access::{PaymentStatus, ProductCode};
use vinculo_common::config::ServiceConfig;
use vinculo_common::db::{init_memory_database, insert_access_record, NewAccessRecord};
use vinculo_common::ProductTier;
use vinculo_server::geo::GeoResolver;
use vinculo_server::payments::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider, PaymentSession,
};
use vinculo_server::{build_router, AppState};

/// Mock provider with a fixed table of sessions
#[derive(Default)]
struct MockProvider {
    sessions: Mutex<HashMap<String, PaymentSession>>,
    created: Mutex<Vec<CheckoutRequest>>,
}

impl MockProvider {
    fn with_session(self, id: &str, paid: bool, product: ProductCode, email: Option<&str>) -> Self {
        self.sessions.lock().unwrap().insert(
            id.to_string(),
            PaymentSession {
                id: id.to_string(),
                paid,
                product: Some(product),
                email: email.map(str::to_string),
            },
        );
        self
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        self.created.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            id: "cs_new".to_string(),
            url: Some("https://pay.example.com/cs_new".to_string()),
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession, PaymentError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::SessionNotFound(session_id.to_string()))
    }
}

struct TestApp {
    router: axum::Router,
    db: SqlitePool,
    provider: Arc<MockProvider>,
}

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.public_base_url = "https://vinculo.example.com/".to_string();
    config.payments.secret_key = Some("sk_test".to_string());
    config.payments.price_quick = Some("price_quick".to_string());
    config.payments.price_deep = Some("price_deep".to_string());
    config
}

/// Test helper: app backed by an in-memory database
async fn setup_app(provider: MockProvider, config: ServiceConfig, with_payments: bool) -> TestApp {
    let db = init_memory_database().await.expect("Should create in-memory database");
    let provider = Arc::new(provider);
    let payments: Option<Arc<dyn PaymentProvider>> = if with_payments {
        Some(provider.clone() as Arc<dyn PaymentProvider>)
    } else {
        None
    };

    let state = AppState::new(db.clone(), config, payments, GeoResolver::disabled(1000));
    TestApp {
        router: build_router(state),
        db,
        provider,
    }
}

async fn default_app() -> TestApp {
    setup_app(MockProvider::default(), test_config(), true).await
}

async fn grant(db: &SqlitePool, session_id: &str, email: Option<&str>, tier: ProductTier) {
    insert_access_record(
        db,
        &NewAccessRecord {
            session_id: session_id.to_string(),
            email: email.map(str::to_string),
            tier,
            status: PaymentStatus::Paid,
        },
    )
    .await
    .expect("Should insert access record");
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn quick_answers(value: u8) -> Value {
    let map: serde_json::Map<String, Value> = ProductTier::Quick
        .question_ids()
        .into_iter()
        .map(|id| (id.to_string(), json!(value)))
        .collect();
    Value::Object(map)
}

async fn count(db: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(db)
        .await
        .unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = default_app().await;

    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "vinculo-server");
    assert!(body["version"].is_string());
}

// =============================================================================
// Report gating
// =============================================================================

#[tokio::test]
async fn test_quick_report_without_identity_is_paywalled() {
    let app = default_app().await;

    let request = post_json("/api/report/quick", json!({ "answers": quick_answers(4) }));
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["outcome"], "paywall");
    assert_eq!(body["band"], "PRECAUCION");
    assert_eq!(body["color"], "amber");
    assert_eq!(body["offer"], "quick");
    // Teaser must not leak the score or the recommendation
    assert!(body.get("score").is_none());
    assert!(body.get("state").is_none());

    assert_eq!(count(&app.db, "result_snapshots").await, 0);
}

#[tokio::test]
async fn test_quick_report_with_paid_session_is_full() {
    let app = default_app().await;
    grant(&app.db, "cs_quick", None, ProductTier::Quick).await;

    let request = post_json(
        "/api/report/quick",
        json!({ "answers": quick_answers(5), "session_id": "cs_quick", "submission_id": "sub-1" }),
    );
    let response = app.router.oneshot(request).await.unwrap();
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["outcome"], "full_report");
    assert_eq!(body["score"], 100);
    assert_eq!(body["state"]["band"], "SOLIDO");
    assert_eq!(body["state"]["color"], "emerald");
    assert!(body["snapshot_id"].is_string());
    assert!(body["generated_at"].is_string());
    assert!(body.get("dimensions").is_none());

    assert_eq!(count(&app.db, "result_snapshots").await, 1);
}

#[tokio::test]
async fn test_deep_access_unlocks_quick_report() {
    let app = default_app().await;
    grant(&app.db, "cs_deep", None, ProductTier::Deep).await;

    let request = post_json(
        "/api/report/quick",
        json!({ "answers": quick_answers(4), "session_id": "cs_deep" }),
    );
    let body = extract_json(app.router.oneshot(request).await.unwrap().into_body()).await;
    assert_eq!(body["outcome"], "full_report");
    assert_eq!(body["score"], 75);
}

#[tokio::test]
async fn test_quick_access_does_not_unlock_deep_report() {
    let app = default_app().await;
    grant(&app.db, "cs_quick", Some("ana@example.com"), ProductTier::Quick).await;

    let request = post_json(
        "/api/report/deep",
        json!({ "answers": { "tru_1": 4 }, "email": "Ana@Example.com" }),
    );
    let body = extract_json(app.router.oneshot(request).await.unwrap().into_body()).await;

    assert_eq!(body["outcome"], "paywall");
    assert_eq!(body["offer"], "upgrade");
    assert_eq!(body["total_questions"], 22);
}

#[tokio::test]
async fn test_deep_report_breakdown() {
    let app = default_app().await;
    grant(&app.db, "cs_deep", None, ProductTier::Deep).await;

    let request = post_json(
        "/api/report/deep",
        json!({
            "session_id": "cs_deep",
            "answers": { "tru_1": 4, "tru_2": 5, "tru_3": 3, "tru_4": 4 }
        }),
    );
    let body = extract_json(app.router.oneshot(request).await.unwrap().into_body()).await;

    assert_eq!(body["outcome"], "full_report");
    assert_eq!(body["score"], 75);
    assert_eq!(body["answered"], 4);
    assert_eq!(body["focus_dimension"], "trust");

    let dimensions = body["dimensions"].as_array().unwrap();
    assert_eq!(dimensions.len(), 5);
    let trust = dimensions.iter().find(|d| d["dimension"] == "trust").unwrap();
    assert_eq!(trust["score"], 75);
    assert_eq!(trust["state"]["band"], "PRECAUCION");
    let communication = dimensions
        .iter()
        .find(|d| d["dimension"] == "communication")
        .unwrap();
    assert_eq!(communication["score"], 0);
    assert_eq!(communication["state"]["band"], "CRITICO");
}

#[tokio::test]
async fn test_report_via_query_parameters() {
    let app = default_app().await;
    grant(&app.db, "cs_quick", None, ProductTier::Quick).await;

    let uri = "/api/report/quick?session_id=cs_quick&ras_1=4&ras_2=4&ras_3=4&ras_4=4&ras_5=4&ras_6=4&ras_7=4";
    let body = extract_json(app.router.oneshot(get(uri)).await.unwrap().into_body()).await;

    assert_eq!(body["outcome"], "full_report");
    assert_eq!(body["score"], 75);
}

#[tokio::test]
async fn test_cached_identity_cookie_is_used() {
    let app = default_app().await;
    grant(&app.db, "cs_cookie", None, ProductTier::Deep).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/report/deep")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, "vinculo_identity=session:cs_cookie")
        .body(Body::from(json!({ "answers": {} }).to_string()))
        .unwrap();
    let body = extract_json(app.router.oneshot(request).await.unwrap().into_body()).await;
    assert_eq!(body["outcome"], "full_report");
}

#[tokio::test]
async fn test_explicit_identity_overrides_cookie() {
    let app = default_app().await;
    grant(&app.db, "cs_cookie", None, ProductTier::Deep).await;

    // Explicit unpaid session wins over the paid cached one
    let request = Request::builder()
        .method("POST")
        .uri("/api/report/deep")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, "vinculo_identity=session:cs_cookie")
        .body(Body::from(json!({ "session_id": "cs_unpaid" }).to_string()))
        .unwrap();
    let body = extract_json(app.router.oneshot(request).await.unwrap().into_body()).await;
    assert_eq!(body["outcome"], "paywall");
}

#[tokio::test]
async fn test_repeated_submission_stores_one_snapshot() {
    let app = default_app().await;
    grant(&app.db, "cs_quick", None, ProductTier::Quick).await;

    let body = json!({ "answers": quick_answers(3), "session_id": "cs_quick", "submission_id": "sub-7" });
    let first = extract_json(
        app.router
            .clone()
            .oneshot(post_json("/api/report/quick", body.clone()))
            .await
            .unwrap()
            .into_body(),
    )
    .await;
    let second = extract_json(
        app.router
            .oneshot(post_json("/api/report/quick", body))
            .await
            .unwrap()
            .into_body(),
    )
    .await;

    assert_eq!(first["snapshot_id"], second["snapshot_id"]);
    assert_eq!(count(&app.db, "result_snapshots").await, 1);
}

#[tokio::test]
async fn test_snapshot_failure_does_not_block_report() {
    let app = default_app().await;
    grant(&app.db, "cs_quick", None, ProductTier::Quick).await;
    sqlx::query("DROP TABLE result_snapshots").execute(&app.db).await.unwrap();

    let request = post_json(
        "/api/report/quick",
        json!({ "answers": quick_answers(4), "session_id": "cs_quick" }),
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["outcome"], "full_report");
    assert!(body["snapshot_id"].is_null());
}

#[tokio::test]
async fn test_access_lookup_failure_fails_closed() {
    let app = default_app().await;
    grant(&app.db, "cs_deep", None, ProductTier::Deep).await;
    sqlx::query("DROP TABLE access_records").execute(&app.db).await.unwrap();

    let request = post_json("/api/report/deep", json!({ "session_id": "cs_deep" }));
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["outcome"], "paywall");
}

#[tokio::test]
async fn test_unknown_tier_is_bad_request() {
    let app = default_app().await;
    let response = app.router.oneshot(get("/api/report/premium")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_access_endpoint() {
    let app = default_app().await;
    grant(&app.db, "cs_deep", Some("ana@example.com"), ProductTier::Deep).await;

    let body = extract_json(
        app.router
            .clone()
            .oneshot(get("/api/access?email=ana@example.com"))
            .await
            .unwrap()
            .into_body(),
    )
    .await;
    assert_eq!(body["access"], "deep");

    let body = extract_json(app.router.oneshot(get("/api/access")).await.unwrap().into_body()).await;
    assert_eq!(body["access"], "none");
}

// =============================================================================
// Checkout and payment verification
// =============================================================================

#[tokio::test]
async fn test_create_checkout() {
    let app = default_app().await;

    let request = post_json("/api/checkout", json!({ "product": "deep", "email": " Ana@Example.com " }));
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["id"], "cs_new");

    let created = app.provider.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].price_id, "price_deep");
    assert_eq!(created[0].email.as_deref(), Some("ana@example.com"));
    assert!(created[0]
        .success_url
        .starts_with("https://vinculo.example.com/resultado?tier=deep"));
}

#[tokio::test]
async fn test_checkout_missing_price_is_config_error() {
    let app = default_app().await;

    // test_config() sets no upgrade price
    let request = post_json("/api/checkout", json!({ "product": "upgrade" }));
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "CONFIG_ERROR");
}

#[tokio::test]
async fn test_checkout_without_provider_is_config_error() {
    let app = setup_app(MockProvider::default(), test_config(), false).await;

    let request = post_json("/api/checkout", json!({ "product": "quick" }));
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_verify_records_once_and_sets_cookie() {
    let provider = MockProvider::default().with_session("cs_paid", true, ProductCode::Upgrade, Some("ana@example.com"));
    let app = setup_app(provider, test_config(), true).await;

    let first = app
        .router
        .clone()
        .oneshot(post_json("/api/checkout/verify", json!({ "session_id": "cs_paid" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = first
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("vinculo_identity=session:cs_paid"));

    let body = extract_json(first.into_body()).await;
    assert_eq!(body["result"]["status"], "recorded");
    assert_eq!(body["result"]["tier"], "deep");

    let second = app
        .router
        .oneshot(post_json("/api/checkout/verify", json!({ "session_id": "cs_paid" })))
        .await
        .unwrap();
    let body = extract_json(second.into_body()).await;
    assert_eq!(body["result"]["status"], "already_recorded");

    assert_eq!(count(&app.db, "access_records").await, 1);
}

#[tokio::test]
async fn test_verify_unpaid_session() {
    let provider = MockProvider::default().with_session("cs_open", false, ProductCode::Quick, None);
    let app = setup_app(provider, test_config(), true).await;

    let response = app
        .router
        .oneshot(post_json("/api/checkout/verify", json!({ "session_id": "cs_open" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["result"]["status"], "not_paid");
    assert_eq!(count(&app.db, "access_records").await, 0);
}

#[tokio::test]
async fn test_verify_unknown_session_is_upstream_error() {
    let app = default_app().await;

    let response = app
        .router
        .oneshot(post_json("/api/checkout/verify", json!({ "session_id": "cs_ghost" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_webhook_then_verify_records_once() {
    let provider = MockProvider::default().with_session("cs_hook", true, ProductCode::Quick, None);
    let app = setup_app(provider, test_config(), true).await;

    let event = json!({
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_hook" } }
    });
    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/webhooks/payment", event.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["result"]["status"], "recorded");

    // Provider retries the webhook, then the success page verifies
    app.router
        .clone()
        .oneshot(post_json("/api/webhooks/payment", event))
        .await
        .unwrap();
    let body = extract_json(
        app.router
            .oneshot(post_json("/api/checkout/verify", json!({ "session_id": "cs_hook" })))
            .await
            .unwrap()
            .into_body(),
    )
    .await;
    assert_eq!(body["result"]["status"], "already_recorded");
    assert_eq!(body["result"]["tier"], "quick");

    assert_eq!(count(&app.db, "access_records").await, 1);
    let status: String = sqlx::query_scalar("SELECT status FROM access_records WHERE session_id = 'cs_hook'")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(status, "completed");
}

#[tokio::test]
async fn test_webhook_acknowledges_session_without_product() {
    let provider = MockProvider::default();
    provider.sessions.lock().unwrap().insert(
        "cs_bare".to_string(),
        PaymentSession {
            id: "cs_bare".to_string(),
            paid: true,
            product: None,
            email: None,
        },
    );
    let app = setup_app(provider, test_config(), true).await;

    let event = json!({
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_bare" } }
    });
    let response = app.router.oneshot(post_json("/api/webhooks/payment", event)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["result"]["status"], "unknown_product");
    assert_eq!(count(&app.db, "access_records").await, 0);
}

#[tokio::test]
async fn test_webhook_ignores_other_events() {
    let app = default_app().await;

    let event = json!({ "type": "invoice.paid", "data": { "object": { "id": "in_1" } } });
    let body = extract_json(
        app.router
            .oneshot(post_json("/api/webhooks/payment", event))
            .await
            .unwrap()
            .into_body(),
    )
    .await;
    assert_eq!(body["ignored"], true);
    assert_eq!(count(&app.db, "access_records").await, 0);
}

#[tokio::test]
async fn test_webhook_without_session_id_is_bad_request() {
    let app = default_app().await;

    let event = json!({ "type": "checkout.session.completed", "data": { "object": {} } });
    let response = app.router.oneshot(post_json("/api/webhooks/payment", event)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Leads and events
// =============================================================================

#[tokio::test]
async fn test_lead_capture() {
    let app = default_app().await;

    let lead = json!({ "email": "ana@example.com", "source": "paywall", "tier": "deep", "score": 64 });
    let first = app
        .router
        .clone()
        .oneshot(post_json("/api/leads", lead.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app.router.clone().oneshot(post_json("/api/leads", lead)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    let invalid = app
        .router
        .oneshot(post_json("/api/leads", json!({ "email": "nope" })))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    assert_eq!(count(&app.db, "leads").await, 1);
}

#[tokio::test]
async fn test_events_always_no_content() {
    let app = default_app().await;

    let cases = [
        Body::from(json!({ "name": "quiz_started", "session_id": "s-1" }).to_string()),
        Body::from(json!({ "name": "not_allowed", "session_id": "s-1" }).to_string()),
        Body::from(json!({ "name": "checkout_started", "session_id": "s-1" }).to_string()),
        Body::from("{ this is not json"),
    ];

    for body in cases {
        let request = Request::builder()
            .method("POST")
            .uri("/api/events")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    // Only the allow-listed, complete event is stored (written in the background)
    let mut stored = 0;
    for _ in 0..50 {
        stored = count(&app.db, "analytics_events").await;
        if stored > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(stored, 1);
}

//! vinculo-server library
//!
//! HTTP service for the relationship diagnostic: scored reports behind a paywall,
//! checkout and payment verification, lead capture and event tracking.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vinculo_common::config::ServiceConfig;

pub mod api;
pub mod error;
pub mod gate;
pub mod geo;
pub mod payments;

use gate::{AccessGate, SqliteAccessStore};
use geo::GeoResolver;
use payments::PaymentProvider;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<ServiceConfig>,
    pub gate: Arc<AccessGate>,
    pub geo: Arc<GeoResolver>,
}

impl AppState {
    /// Create application state; `payments` is `None` when no secret key is configured
    pub fn new(
        db: SqlitePool,
        config: ServiceConfig,
        payments: Option<Arc<dyn PaymentProvider>>,
        geo: GeoResolver,
    ) -> Self {
        let store = Arc::new(SqliteAccessStore::new(db.clone()));
        let gate = AccessGate::new(store, payments, config.access_check_timeout());

        Self {
            db,
            config: Arc::new(config),
            gate: Arc::new(gate),
            geo: Arc::new(geo),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/report/:tier", get(api::get_report).post(api::post_report))
        .route("/api/access", get(api::get_access))
        .route("/api/checkout", post(api::create_checkout))
        .route("/api/checkout/verify", post(api::verify_checkout))
        .route("/api/webhooks/payment", post(api::payment_webhook))
        .route("/api/leads", post(api::capture_lead))
        .route("/api/events", post(api::track_event));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

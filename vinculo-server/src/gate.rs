//! Access gate
//!
//! Decides what a visitor may see and records completed payments. Lookups fail
//! closed: a timeout, a store error or a missing identity all produce
//! [`AccessLevel::None`], which the report handler renders as the paywall.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vinculo_common::access::{AccessLevel, AccessResolution, IdentityKey, PaymentStatus};
use vinculo_common::db::{self, AccessRecord, InsertOutcome, NewAccessRecord};
use vinculo_common::questions::ProductTier;

use crate::error::{ApiError, ApiResult};
use crate::payments::PaymentProvider;

/// Persistence behind the gate
#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn access_level(&self, identity: &IdentityKey) -> vinculo_common::Result<AccessLevel>;

    async fn find(&self, session_id: &str) -> vinculo_common::Result<Option<AccessRecord>>;

    async fn insert(&self, record: &NewAccessRecord) -> vinculo_common::Result<InsertOutcome>;

    async fn promote_pending(&self, session_id: &str, status: PaymentStatus) -> vinculo_common::Result<bool>;
}

/// SQLite-backed access store
#[derive(Clone)]
pub struct SqliteAccessStore {
    pool: SqlitePool,
}

impl SqliteAccessStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessStore for SqliteAccessStore {
    async fn access_level(&self, identity: &IdentityKey) -> vinculo_common::Result<AccessLevel> {
        db::lookup_access_level(&self.pool, identity).await
    }

    async fn find(&self, session_id: &str) -> vinculo_common::Result<Option<AccessRecord>> {
        db::find_access_record(&self.pool, session_id).await
    }

    async fn insert(&self, record: &NewAccessRecord) -> vinculo_common::Result<InsertOutcome> {
        db::insert_access_record(&self.pool, record).await
    }

    async fn promote_pending(&self, session_id: &str, status: PaymentStatus) -> vinculo_common::Result<bool> {
        db::promote_pending_access(&self.pool, session_id, status).await
    }
}

/// Result of an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub level: AccessLevel,
    pub resolution: AccessResolution,
    pub identity: Option<IdentityKey>,
}

impl AccessDecision {
    fn denied(resolution: AccessResolution, identity: Option<IdentityKey>) -> Self {
        Self {
            level: AccessLevel::None,
            resolution,
            identity,
        }
    }
}

/// Result of verify-and-record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "tier", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// This call wrote the access record
    Recorded(ProductTier),
    /// A webhook or earlier call already wrote it
    AlreadyRecorded(ProductTier),
    /// The provider does not report the session as paid
    NotPaid,
    /// Paid, but the session carries no product code we sell; nothing recorded
    UnknownProduct,
}

impl VerifyOutcome {
    pub fn tier(&self) -> Option<ProductTier> {
        match self {
            VerifyOutcome::Recorded(tier) | VerifyOutcome::AlreadyRecorded(tier) => Some(*tier),
            VerifyOutcome::NotPaid | VerifyOutcome::UnknownProduct => None,
        }
    }
}

pub struct AccessGate {
    store: Arc<dyn AccessStore>,
    payments: Option<Arc<dyn PaymentProvider>>,
    timeout: Duration,
}

impl AccessGate {
    pub fn new(
        store: Arc<dyn AccessStore>,
        payments: Option<Arc<dyn PaymentProvider>>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            payments,
            timeout,
        }
    }

    pub fn payments(&self) -> Option<&Arc<dyn PaymentProvider>> {
        self.payments.as_ref()
    }

    /// Stored access level for an identity, failing closed
    pub async fn check_access(&self, identity: Option<IdentityKey>) -> AccessDecision {
        let Some(identity) = identity else {
            debug!("Access check without identity");
            return AccessDecision::denied(AccessResolution::NoIdentity, None);
        };

        match tokio::time::timeout(self.timeout, self.store.access_level(&identity)).await {
            Ok(Ok(AccessLevel::None)) => AccessDecision::denied(AccessResolution::NotPaid, Some(identity)),
            Ok(Ok(level)) => AccessDecision {
                level,
                resolution: AccessResolution::Granted,
                identity: Some(identity),
            },
            Ok(Err(e)) => {
                warn!(error = %e, "Access lookup failed, failing closed");
                AccessDecision::denied(AccessResolution::LookupFailed, Some(identity))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Access lookup timed out, failing closed");
                AccessDecision::denied(AccessResolution::TimedOut, Some(identity))
            }
        }
    }

    /// Record a completed payment exactly once per session id
    ///
    /// The store is checked first because the webhook usually wins the race. Otherwise
    /// the provider is asked directly. A conflicting insert means the other path got
    /// there in between and counts as success.
    pub async fn verify_and_record(&self, session_id: &str, status: PaymentStatus) -> ApiResult<VerifyOutcome> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ApiError::BadRequest("session_id is required".to_string()));
        }

        let existing = self.store.find(session_id).await?;
        if let Some(record) = &existing {
            if record.status.grants_access() {
                debug!(session_id, "Payment already recorded");
                return Ok(VerifyOutcome::AlreadyRecorded(record.tier));
            }
        }

        let payments = self
            .payments
            .as_ref()
            .ok_or_else(|| ApiError::Config("payment provider is not configured".to_string()))?;

        let session = payments.retrieve_session(session_id).await?;
        if !session.paid {
            info!(session_id, "Checkout session not paid");
            return Ok(VerifyOutcome::NotPaid);
        }

        // A pending row already knows its tier
        if let Some(record) = existing {
            if self.store.promote_pending(session_id, status).await? {
                info!(session_id, tier = %record.tier, "Pending access record promoted");
                return Ok(VerifyOutcome::Recorded(record.tier));
            }
            debug!(session_id, "Pending access record promoted concurrently");
            return Ok(VerifyOutcome::AlreadyRecorded(record.tier));
        }

        let Some(product) = session.product else {
            warn!(session_id, "Paid checkout session has no product metadata, nothing recorded");
            return Ok(VerifyOutcome::UnknownProduct);
        };
        let tier = product.tier();

        let record = NewAccessRecord {
            session_id: session_id.to_string(),
            email: session.email.as_deref().and_then(vinculo_common::access::normalise_email),
            tier,
            status,
        };

        match self.store.insert(&record).await? {
            InsertOutcome::Inserted => {
                info!(session_id, tier = %tier, product = %product, "Access recorded");
                Ok(VerifyOutcome::Recorded(tier))
            }
            InsertOutcome::AlreadyRecorded => {
                debug!(session_id, "Access recorded concurrently");
                Ok(VerifyOutcome::AlreadyRecorded(tier))
            }
        }
    }
}

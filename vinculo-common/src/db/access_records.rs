//! Paid access records
//!
//! One row per payment provider checkout session. Rows are created by the webhook or
//! the verify path, whichever arrives first; the unique `session_id` makes the second
//! writer a no-op.

use sqlx::SqlitePool;
use uuid::Uuid;

use super::InsertOutcome;
use crate::access::{AccessLevel, IdentityKey, PaymentStatus};
use crate::questions::ProductTier;
use crate::{Error, Result};

/// Stored access record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub guid: String,
    pub session_id: String,
    pub email: Option<String>,
    pub tier: ProductTier,
    pub status: PaymentStatus,
}

/// Access record to insert
#[derive(Debug, Clone)]
pub struct NewAccessRecord {
    pub session_id: String,
    pub email: Option<String>,
    pub tier: ProductTier,
    pub status: PaymentStatus,
}

fn parse_record(
    (guid, session_id, email, tier, status): (String, String, Option<String>, String, String),
) -> Result<AccessRecord> {
    let tier = tier
        .parse::<ProductTier>()
        .map_err(|e| Error::Internal(format!("Corrupt access record {}: {}", guid, e)))?;
    let status = status
        .parse::<PaymentStatus>()
        .map_err(|e| Error::Internal(format!("Corrupt access record {}: {}", guid, e)))?;

    Ok(AccessRecord {
        guid,
        session_id,
        email,
        tier,
        status,
    })
}

/// Find the record for a payment session
pub async fn find_access_record(pool: &SqlitePool, session_id: &str) -> Result<Option<AccessRecord>> {
    let row = sqlx::query_as::<_, (String, String, Option<String>, String, String)>(
        "SELECT guid, session_id, email, tier, status FROM access_records WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    row.map(parse_record).transpose()
}

/// Insert unless the session is already recorded
pub async fn insert_access_record(pool: &SqlitePool, record: &NewAccessRecord) -> Result<InsertOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO access_records (guid, session_id, email, tier, status)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&record.session_id)
    .bind(&record.email)
    .bind(record.tier.as_str())
    .bind(record.status.as_str())
    .execute(pool)
    .await?;

    Ok(InsertOutcome::from_rows_affected(result.rows_affected()))
}

/// Move a pending record to a granting status; returns whether a row changed
pub async fn promote_pending_access(
    pool: &SqlitePool,
    session_id: &str,
    status: PaymentStatus,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE access_records SET status = ? WHERE session_id = ? AND status = 'pending'",
    )
    .bind(status.as_str())
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Highest paid tier reachable through an identity
///
/// Pending records grant nothing.
pub async fn lookup_access_level(pool: &SqlitePool, identity: &IdentityKey) -> Result<AccessLevel> {
    let (column, value) = match identity {
        IdentityKey::Session(id) => ("session_id", id.as_str()),
        IdentityKey::Email(email) => ("email", email.as_str()),
    };

    let sql = format!(
        "SELECT tier FROM access_records WHERE {} = ? AND status IN ('paid', 'completed')",
        column
    );
    let tiers: Vec<String> = sqlx::query_scalar(&sql).bind(value).fetch_all(pool).await?;

    let level = tiers
        .iter()
        .filter_map(|t| t.parse::<ProductTier>().ok())
        .map(AccessLevel::from)
        .max()
        .unwrap_or(AccessLevel::None);

    Ok(level)
}

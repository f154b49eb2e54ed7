//! Lead capture storage
//!
//! Emails are unique; capturing the same address twice keeps the first row.

use sqlx::SqlitePool;
use uuid::Uuid;

use super::InsertOutcome;
use crate::access::normalise_email;
use crate::questions::ProductTier;
use crate::{Error, Result};

/// Lead submitted from a capture form
#[derive(Debug, Clone)]
pub struct NewLead {
    pub email: String,
    /// Form or page the lead came from
    pub source: Option<String>,
    pub tier: Option<ProductTier>,
    pub score: Option<u8>,
}

/// Store a lead; the email is normalised first
pub async fn save_lead(pool: &SqlitePool, lead: &NewLead) -> Result<InsertOutcome> {
    let email = normalise_email(&lead.email)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid email: {}", lead.email)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO leads (guid, email, source, tier, score)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(email)
    .bind(&lead.source)
    .bind(lead.tier.map(|t| t.as_str()))
    .bind(lead.score.map(i64::from))
    .execute(pool)
    .await?;

    Ok(InsertOutcome::from_rows_affected(result.rows_affected()))
}

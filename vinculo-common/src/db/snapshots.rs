//! Result snapshots
//!
//! One row per authorized report view, keyed by the client's submission id. Saving
//! the same submission twice returns the first row instead of writing a duplicate.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::InsertOutcome;
use crate::answers::AnswerSet;
use crate::diagnostic::DiagnosticBand;
use crate::questions::ProductTier;
use crate::{Error, Result};

/// Snapshot to persist
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    /// Client-chosen id for this run; generated when absent (no dedup then)
    pub submission_id: Option<String>,
    pub tier: ProductTier,
    pub score: u8,
    pub band: DiagnosticBand,
    /// Per-dimension breakdown, long form only
    pub dimensions: Option<Value>,
    pub answers: AnswerSet,
    /// Identity that unlocked the report
    pub identity: Option<String>,
}

/// Outcome of [`save_snapshot`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSnapshot {
    pub guid: String,
    pub submission_id: String,
    pub outcome: InsertOutcome,
}

/// Stored snapshot as read back
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub guid: String,
    pub submission_id: String,
    pub tier: ProductTier,
    pub score: u8,
    pub band: DiagnosticBand,
    pub dimensions: Option<Value>,
    pub answers: AnswerSet,
    pub identity: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persist a snapshot once per submission id
pub async fn save_snapshot(pool: &SqlitePool, snapshot: &NewSnapshot) -> Result<SavedSnapshot> {
    let guid = Uuid::new_v4().to_string();
    let submission_id = snapshot
        .submission_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let dimensions = snapshot
        .dimensions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let answers = serde_json::to_string(&snapshot.answers)?;

    let result = sqlx::query(
        r#"
        INSERT INTO result_snapshots (guid, submission_id, tier, score, band, dimensions, answers, identity)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(submission_id) DO NOTHING
        "#,
    )
    .bind(&guid)
    .bind(&submission_id)
    .bind(snapshot.tier.as_str())
    .bind(snapshot.score as i64)
    .bind(snapshot.band.as_str())
    .bind(dimensions)
    .bind(answers)
    .bind(&snapshot.identity)
    .execute(pool)
    .await?;

    let outcome = InsertOutcome::from_rows_affected(result.rows_affected());
    let guid = match outcome {
        InsertOutcome::Inserted => guid,
        InsertOutcome::AlreadyRecorded => {
            sqlx::query_scalar("SELECT guid FROM result_snapshots WHERE submission_id = ?")
                .bind(&submission_id)
                .fetch_one(pool)
                .await?
        }
    };

    Ok(SavedSnapshot {
        guid,
        submission_id,
        outcome,
    })
}

/// Load a snapshot by guid
pub async fn get_snapshot(pool: &SqlitePool, guid: &str) -> Result<Option<StoredSnapshot>> {
    let row = sqlx::query_as::<
        _,
        (String, String, String, i64, String, Option<String>, String, Option<String>, DateTime<Utc>),
    >(
        r#"
        SELECT guid, submission_id, tier, score, band, dimensions, answers, identity, created_at
        FROM result_snapshots
        WHERE guid = ?
        "#,
    )
    .bind(guid)
    .fetch_optional(pool)
    .await?;

    let Some((guid, submission_id, tier, score, band, dimensions, answers, identity, created_at)) = row else {
        return Ok(None);
    };

    let score = u8::try_from(score)
        .map_err(|_| Error::Internal(format!("Snapshot {} has invalid score {}", guid, score)))?;

    Ok(Some(StoredSnapshot {
        tier: tier.parse()?,
        band: band.parse()?,
        score,
        dimensions: dimensions.as_deref().map(serde_json::from_str::<Value>).transpose()?,
        answers: serde_json::from_str(&answers)?,
        guid,
        submission_id,
        identity,
        created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use serde_json::json;

    fn quick_snapshot(submission_id: Option<&str>) -> NewSnapshot {
        NewSnapshot {
            submission_id: submission_id.map(str::to_string),
            tier: ProductTier::Quick,
            score: 75,
            band: DiagnosticBand::Precaucion,
            dimensions: None,
            answers: AnswerSet::from_pairs([("ras_1", "4"), ("ras_2", "4")]),
            identity: Some("session:cs_1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_same_submission_saved_once() {
        let pool = init_memory_database().await.unwrap();

        let first = save_snapshot(&pool, &quick_snapshot(Some("sub-1"))).await.unwrap();
        let second = save_snapshot(&pool, &quick_snapshot(Some("sub-1"))).await.unwrap();

        assert_eq!(first.outcome, InsertOutcome::Inserted);
        assert_eq!(second.outcome, InsertOutcome::AlreadyRecorded);
        assert_eq!(first.guid, second.guid);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM result_snapshots")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_missing_submission_id_gets_generated() {
        let pool = init_memory_database().await.unwrap();

        let first = save_snapshot(&pool, &quick_snapshot(None)).await.unwrap();
        let second = save_snapshot(&pool, &quick_snapshot(Some("  "))).await.unwrap();

        assert_ne!(first.submission_id, second.submission_id);
        assert_eq!(second.outcome, InsertOutcome::Inserted);
    }

    #[tokio::test]
    async fn test_snapshot_reads_back() {
        let pool = init_memory_database().await.unwrap();
        let mut snapshot = quick_snapshot(Some("sub-2"));
        snapshot.tier = ProductTier::Deep;
        snapshot.dimensions = Some(json!({"trust": 75}));

        let saved = save_snapshot(&pool, &snapshot).await.unwrap();
        let stored = get_snapshot(&pool, &saved.guid).await.unwrap().unwrap();

        assert_eq!(stored.tier, ProductTier::Deep);
        assert_eq!(stored.score, 75);
        assert_eq!(stored.band, DiagnosticBand::Precaucion);
        assert_eq!(stored.dimensions, Some(json!({"trust": 75})));
        assert_eq!(stored.answers.get("ras_1"), Some(4));
        assert_eq!(stored.identity.as_deref(), Some("session:cs_1"));
        assert!((Utc::now() - stored.created_at).num_minutes().abs() < 5);
    }
}

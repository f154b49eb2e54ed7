//! Database models and queries
//!
//! SQLite via sqlx. Idempotency is enforced with unique keys: an insert that hits an
//! existing key reports [`InsertOutcome::AlreadyRecorded`] instead of failing.

pub mod access_records;
pub mod events;
pub mod init;
pub mod leads;
pub mod snapshots;

pub use access_records::*;
pub use events::*;
pub use init::*;
pub use leads::*;
pub use snapshots::*;

/// Result of an idempotent insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written
    Inserted,
    /// A row with the same natural key already existed
    AlreadyRecorded,
}

impl InsertOutcome {
    pub(crate) fn from_rows_affected(rows: u64) -> Self {
        if rows == 0 {
            InsertOutcome::AlreadyRecorded
        } else {
            InsertOutcome::Inserted
        }
    }
}

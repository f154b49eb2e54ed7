//! # Vínculo Common Library
//!
//! Shared code for the Vínculo relationship diagnostic service:
//! - Questionnaire tables (quick RAS form, deep 22-question form)
//! - Answer parsing and score calculation
//! - Diagnostic classification (the only place band thresholds live)
//! - Access decision table for paid reports
//! - Analytics event allow-list
//! - Configuration loading
//! - SQLite persistence (access records, snapshots, events, leads)

pub mod access;
pub mod answers;
pub mod config;
pub mod db;
pub mod diagnostic;
pub mod error;
pub mod questions;
pub mod scoring;
pub mod tracking;

pub use answers::AnswerSet;
pub use diagnostic::{classify, DiagnosticBand, DiagnosticState};
pub use error::{Error, Result};
pub use questions::{Dimension, ProductTier};
pub use scoring::{compute_long_scores, compute_short_score, LongScores};

//! Score calculation for the quick and deep questionnaires
//!
//! Pure functions: the same answers always produce the same scores. Missing answers
//! are excluded from sums and averages, and every result is clamped to [0, 100].

use serde::Serialize;

use crate::answers::{AnswerSet, LIKERT_MAX, LIKERT_MIN};
use crate::diagnostic::{classify, DiagnosticState, SCORE_MAX};
use crate::questions::{Dimension, SHORT_FORM_QUESTIONS};

/// Lowest possible raw sum of a complete short form
const SHORT_RAW_MIN: f64 = (SHORT_FORM_QUESTIONS.len() as u8 * LIKERT_MIN) as f64;
/// Highest possible raw sum of a complete short form
const SHORT_RAW_MAX: f64 = (SHORT_FORM_QUESTIONS.len() as u8 * LIKERT_MAX) as f64;

/// Score of a single long form dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub score: u8,
    /// Number of valid answers that contributed
    pub answered: usize,
    pub state: DiagnosticState,
}

/// Long form result: per-dimension breakdown and the global index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongScores {
    pub dimensions: Vec<DimensionScore>,
    pub global: u8,
    pub global_state: DiagnosticState,
}

impl LongScores {
    pub fn score_for(&self, dimension: Dimension) -> Option<&DimensionScore> {
        self.dimensions.iter().find(|d| d.dimension == dimension)
    }

    /// Answered dimension with the lowest score; ties go to report order
    pub fn weakest_dimension(&self) -> Option<&DimensionScore> {
        self.dimensions
            .iter()
            .filter(|d| d.answered > 0)
            .fold(None, |weakest: Option<&DimensionScore>, d| match weakest {
                Some(w) if w.score <= d.score => Some(w),
                _ => Some(d),
            })
    }
}

/// Round half-up and clamp into the index range
fn to_index(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, SCORE_MAX as f64) as u8
}

/// Short form index: linear rescale of the raw sum from [7, 35] into [0, 100]
pub fn compute_short_score(answers: &AnswerSet) -> u8 {
    let sum: u32 = SHORT_FORM_QUESTIONS
        .iter()
        .filter_map(|id| answers.get(id))
        .map(u32::from)
        .sum();

    to_index((sum as f64 - SHORT_RAW_MIN) / (SHORT_RAW_MAX - SHORT_RAW_MIN) * 100.0)
}

/// Score of one dimension plus the number of answers behind it
///
/// With no answers the average defaults to 1, which maps to 0.
pub fn compute_dimension_score(answers: &AnswerSet, dimension: Dimension) -> (u8, usize) {
    let values: Vec<u8> = dimension
        .question_ids()
        .iter()
        .filter_map(|id| answers.get(id))
        .collect();

    let average = if values.is_empty() {
        LIKERT_MIN as f64
    } else {
        values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
    };

    let span = (LIKERT_MAX - LIKERT_MIN) as f64;
    (to_index((average - LIKERT_MIN as f64) / span * 100.0), values.len())
}

/// Long form scores
///
/// The global index is the rounded mean of the dimensions that have at least one
/// answer. Unanswered dimensions still appear in the breakdown with score 0 but do not
/// pull the global index down. With nothing answered the global index is 0.
pub fn compute_long_scores(answers: &AnswerSet) -> LongScores {
    let dimensions: Vec<DimensionScore> = Dimension::ALL
        .iter()
        .map(|&dimension| {
            let (score, answered) = compute_dimension_score(answers, dimension);
            DimensionScore {
                dimension,
                score,
                answered,
                state: classify(score),
            }
        })
        .collect();

    let answered: Vec<f64> = dimensions
        .iter()
        .filter(|d| d.answered > 0)
        .map(|d| d.score as f64)
        .collect();

    let global = if answered.is_empty() {
        0
    } else {
        to_index(answered.iter().sum::<f64>() / answered.len() as f64)
    };

    LongScores {
        dimensions,
        global,
        global_state: classify(global),
    }
}

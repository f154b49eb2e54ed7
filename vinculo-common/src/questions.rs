//! Questionnaire tables
//!
//! Question ids and dimension groupings are fixed at build time. Question text lives
//! with the front end; this module only knows ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Short form question ids (Relationship Assessment Scale, 7 items)
pub const SHORT_FORM_QUESTIONS: [&str; 7] = [
    "ras_1", "ras_2", "ras_3", "ras_4", "ras_5", "ras_6", "ras_7",
];

const COMMUNICATION: [&str; 5] = ["com_1", "com_2", "com_3", "com_4", "com_5"];
const TRUST: [&str; 5] = ["tru_1", "tru_2", "tru_3", "tru_4", "tru_5"];
const AFFECTION: [&str; 4] = ["afe_1", "afe_2", "afe_3", "afe_4"];
const CONFLICT_RESOLUTION: [&str; 4] = ["con_1", "con_2", "con_3", "con_4"];
const COMMITMENT: [&str; 4] = ["cmp_1", "cmp_2", "cmp_3", "cmp_4"];

/// Number of questions in the long form
pub const LONG_FORM_QUESTION_COUNT: usize = 22;

/// Product tier, which is also the questionnaire a visitor fills in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductTier {
    /// Short RAS-based assessment
    Quick,
    /// Long 22-question assessment with per-dimension breakdown
    Deep,
}

impl ProductTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductTier::Quick => "quick",
            ProductTier::Deep => "deep",
        }
    }

    /// All question ids belonging to this tier's questionnaire
    pub fn question_ids(&self) -> Vec<&'static str> {
        match self {
            ProductTier::Quick => SHORT_FORM_QUESTIONS.to_vec(),
            ProductTier::Deep => Dimension::ALL
                .iter()
                .flat_map(|d| d.question_ids().iter().copied())
                .collect(),
        }
    }
}

impl fmt::Display for ProductTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(ProductTier::Quick),
            "deep" => Ok(ProductTier::Deep),
            other => Err(Error::InvalidInput(format!("Unknown product tier: {}", other))),
        }
    }
}

/// Long form scoring dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Communication,
    Trust,
    Affection,
    ConflictResolution,
    Commitment,
}

impl Dimension {
    /// Every dimension, in report order
    pub const ALL: [Dimension; 5] = [
        Dimension::Communication,
        Dimension::Trust,
        Dimension::Affection,
        Dimension::ConflictResolution,
        Dimension::Commitment,
    ];

    /// Stable identifier used in stored breakdowns
    pub fn id(&self) -> &'static str {
        match self {
            Dimension::Communication => "communication",
            Dimension::Trust => "trust",
            Dimension::Affection => "affection",
            Dimension::ConflictResolution => "conflict_resolution",
            Dimension::Commitment => "commitment",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Communication => "Comunicación",
            Dimension::Trust => "Confianza",
            Dimension::Affection => "Afecto",
            Dimension::ConflictResolution => "Resolución de conflictos",
            Dimension::Commitment => "Compromiso",
        }
    }

    pub fn question_ids(&self) -> &'static [&'static str] {
        match self {
            Dimension::Communication => &COMMUNICATION,
            Dimension::Trust => &TRUST,
            Dimension::Affection => &AFFECTION,
            Dimension::ConflictResolution => &CONFLICT_RESOLUTION,
            Dimension::Commitment => &COMMITMENT,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

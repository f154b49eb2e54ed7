//! Likert answer collection
//!
//! Answers arrive as a flat key -> value mapping (URL query or JSON body). Values that
//! are not integers in 1..=5 are dropped on entry, so a 0, a missing key and garbage all
//! mean "not answered".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::questions::ProductTier;
use crate::{Error, Result};

/// Lowest valid Likert response
pub const LIKERT_MIN: u8 = 1;
/// Highest valid Likert response
pub const LIKERT_MAX: u8 = 5;

/// A set of answers keyed by question id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    values: BTreeMap<String, u8>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw string pairs, keeping only valid Likert values
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (key, raw) in pairs {
            if let Ok(value) = raw.as_ref().trim().parse::<i64>() {
                set.insert(key, value);
            }
        }
        set
    }

    /// Build from URL query parameters
    ///
    /// Non-answer parameters (email, session ids) may share the query string; they
    /// never parse as Likert values or are ignored by scoring as unknown ids.
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        Self::from_pairs(query.iter().map(|(k, v)| (k.clone(), v.as_str())))
    }

    /// Build from a JSON object of numbers or numeric strings
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidInput("answers must be a JSON object".to_string()))?;

        let mut set = Self::new();
        for (key, raw) in object {
            let parsed = match raw {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            if let Some(value) = parsed {
                set.insert(key.clone(), value);
            }
        }
        Ok(set)
    }

    /// Record an answer; out-of-range values are treated as absent
    pub fn insert(&mut self, question_id: impl Into<String>, value: i64) {
        let question_id = question_id.into();
        if (LIKERT_MIN as i64..=LIKERT_MAX as i64).contains(&value) {
            self.values.insert(question_id, value as u8);
        } else {
            self.values.remove(&question_id);
        }
    }

    pub fn get(&self, question_id: &str) -> Option<u8> {
        self.values.get(question_id).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of the tier's questions that have an answer
    pub fn answered_count(&self, tier: ProductTier) -> usize {
        tier.question_ids()
            .into_iter()
            .filter(|id| self.values.contains_key(*id))
            .count()
    }

    /// True once every question of the tier has been answered
    pub fn is_complete(&self, tier: ProductTier) -> bool {
        self.answered_count(tier) == tier.question_ids().len()
    }
}

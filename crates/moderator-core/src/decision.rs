//! Threshold decision over provider label scores.

use crate::error::{Error, Result};
use crate::types::LabelScores;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Probability cutoff above which content is flagged.
///
/// Always within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Threshold(f32);

impl Threshold {
    /// Cutoff used when nothing is configured
    pub const DEFAULT: Threshold = Threshold(0.7);

    pub fn new(value: f32) -> Result<Self> {
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(Error::config(format!(
                "threshold must be within [0, 1], got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Strict comparison: a score equal to the cutoff is not flagged
    pub fn is_exceeded_by(self, score: f32) -> bool {
        score > self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f32> for Threshold {
    type Error = Error;

    fn try_from(value: f32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f32 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns whether the highest label score exceeds `threshold`.
///
/// Scores are not assumed to sum to one, but each must be a probability in
/// `[0, 1]`. An empty label set or an out-of-range score is an error, never
/// a silent `false`.
pub fn is_toxic(labels: &LabelScores, threshold: Threshold) -> Result<bool> {
    if labels.is_empty() {
        return Err(Error::NoLabels);
    }

    if let Some((label, score)) = labels.iter().find(|(_, s)| !(0.0..=1.0).contains(s)) {
        return Err(Error::InvalidScores(format!(
            "score for '{}' is not a probability: {}",
            label, score
        )));
    }

    let (label, max) = labels.top().ok_or(Error::NoLabels)?;

    let toxic = threshold.is_exceeded_by(max);
    tracing::trace!(label, score = max, threshold = threshold.value(), toxic, "moderation decision");
    Ok(toxic)
}

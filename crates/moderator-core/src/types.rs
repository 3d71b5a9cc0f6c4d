//! Request and response types for moderation

use crate::decision::{self, Threshold};
use crate::error::{Error, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Text submitted for moderation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationRequest {
    /// Text to classify (no length limit is enforced)
    pub text: String,
}

/// Per-label probabilities in the order the model emits them.
///
/// Serialized as a JSON object keyed by label name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelScores(Vec<(String, f32)>);

impl LabelScores {
    /// Create an empty score set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Pair label names with scores by index.
    ///
    /// Fails when the provider emitted a different number of scores than
    /// it has labels.
    pub fn from_parts(labels: &[String], scores: &[f32]) -> Result<Self> {
        if labels.len() != scores.len() {
            return Err(Error::InvalidScores(format!(
                "{} scores for {} labels",
                scores.len(),
                labels.len()
            )));
        }

        Ok(labels
            .iter()
            .zip(scores.iter())
            .map(|(label, score)| (label.as_str(), *score))
            .collect())
    }

    /// Append a label score, replacing an existing entry with the same label
    pub fn insert(&mut self, label: impl Into<String>, score: f32) {
        let label = label.into();
        match self.0.iter_mut().find(|(name, _)| *name == label) {
            Some(entry) => entry.1 = score,
            None => self.0.push((label, score)),
        }
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.0
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, score)| *score)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(label, score)| (label.as_str(), *score))
    }

    /// Label with the highest score
    pub fn top(&self) -> Option<(&str, f32)> {
        self.iter().max_by(|(_, a), (_, b)| a.total_cmp(b))
    }
}

impl<L: Into<String>> FromIterator<(L, f32)> for LabelScores {
    fn from_iter<I: IntoIterator<Item = (L, f32)>>(iter: I) -> Self {
        let mut scores = Self::new();
        for (label, score) in iter {
            scores.insert(label, score);
        }
        scores
    }
}

impl Serialize for LabelScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, score) in &self.0 {
            map.serialize_entry(label, score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = LabelScores;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of label names to scores")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut scores = LabelScores::new();
                while let Some((label, score)) = access.next_entry::<String, f32>()? {
                    scores.insert(label, score);
                }
                Ok(scores)
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

/// Moderation verdict returned to callers.
///
/// `toxic` is always derived from `labels` by [`ModerationResult::decide`];
/// the type cannot be built with an inconsistent flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationResult {
    input: String,
    labels: LabelScores,
    toxic: bool,
}

impl ModerationResult {
    /// Apply the threshold decision to provider scores
    pub fn decide(
        input: impl Into<String>,
        labels: LabelScores,
        threshold: Threshold,
    ) -> Result<Self> {
        let toxic = decision::is_toxic(&labels, threshold)?;
        Ok(Self {
            input: input.into(),
            labels,
            toxic,
        })
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn labels(&self) -> &LabelScores {
        &self.labels
    }

    pub fn toxic(&self) -> bool {
        self.toxic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_scores_serialize_in_model_order() {
        let scores: LabelScores = [("toxic", 0.85), ("non-toxic", 0.15)].into_iter().collect();
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"toxic":0.85,"non-toxic":0.15}"#);
    }

    #[test]
    fn test_label_scores_deserialize_preserves_order() {
        let scores: LabelScores = serde_json::from_str(r#"{"b":0.2,"a":0.8}"#).unwrap();
        let labels: Vec<&str> = scores.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["b", "a"]);
    }

    #[test]
    fn test_from_parts_pairs_by_index() {
        let labels = vec!["non-toxic".to_string(), "toxic".to_string()];
        let scores = LabelScores::from_parts(&labels, &[0.1, 0.9]).unwrap();
        assert_eq!(scores.get("toxic"), Some(0.9));
        assert_eq!(scores.top(), Some(("toxic", 0.9)));
    }

    #[test]
    fn test_from_parts_rejects_count_mismatch() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = LabelScores::from_parts(&labels, &[0.1, 0.9]).unwrap_err();
        assert!(matches!(err, Error::InvalidScores(ref msg) if msg == "2 scores for 3 labels"));

        assert!(LabelScores::from_parts(&labels[..1], &[0.1, 0.9]).is_err());
    }

    #[test]
    fn test_insert_replaces_duplicate_label() {
        let mut scores = LabelScores::new();
        scores.insert("toxic", 0.1);
        scores.insert("toxic", 0.4);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get("toxic"), Some(0.4));
    }

    #[test]
    fn test_corrupt_scores_never_reach_a_result() {
        let threshold = Threshold::new(0.7).unwrap();

        let nan: LabelScores = [("toxic", f32::NAN), ("non-toxic", 0.2)].into_iter().collect();
        assert!(ModerationResult::decide("x", nan, threshold).is_err());

        let out_of_range: LabelScores = [("toxic", 3.5), ("non-toxic", -2.0)].into_iter().collect();
        assert!(ModerationResult::decide("x", out_of_range, threshold).is_err());
    }

    #[test]
    fn test_result_shape() {
        let labels: LabelScores = [("toxic", 0.85), ("non-toxic", 0.15)].into_iter().collect();
        let threshold = Threshold::new(0.7).unwrap();
        let result = ModerationResult::decide("you are awful", labels, threshold).unwrap();

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["input"], "you are awful");
        assert_eq!(value["toxic"], true);
        assert!(value["labels"]["toxic"].as_f64().unwrap() > 0.84);
    }

    #[test]
    fn test_request_requires_text() {
        let err = serde_json::from_str::<ModerationRequest>(r#"{"body":"hi"}"#);
        assert!(err.is_err());

        let req: ModerationRequest = serde_json::from_str(r#"{"text":""}"#).unwrap();
        assert_eq!(req.text, "");
    }
}

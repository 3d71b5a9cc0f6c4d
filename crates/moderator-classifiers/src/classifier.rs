//! Classifier trait

use async_trait::async_trait;
use moderator_core::{LabelScores, Result};

/// Inference provider scoring text against a fixed label set
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Score the given text, one entry per label in model order
    async fn classify(&self, text: &str) -> Result<LabelScores>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Labels this classifier emits, by index
    fn labels(&self) -> &[String];
}

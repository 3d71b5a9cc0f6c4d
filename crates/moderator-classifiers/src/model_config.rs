//! Model configuration structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the sequence-classification model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name reported in logs and health checks
    #[serde(default)]
    pub name: String,

    /// Model source (where to load from)
    #[serde(default)]
    pub source: ModelSource,

    /// Inference settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

impl ModelConfig {
    /// Name to report for this model
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        match &self.source {
            ModelSource::Local { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "local-model".to_string()),
            ModelSource::HuggingFace { repo, .. } => repo.clone(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            source: ModelSource::default(),
            inference: InferenceConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Load from a local directory holding config, tokenizer and weights
    Local { path: PathBuf },

    /// Download from HuggingFace Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
        /// Download cache, defaults to the user cache directory
        #[serde(default)]
        cache_dir: Option<PathBuf>,
    },
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::HuggingFace {
            repo: default_repo(),
            revision: default_revision(),
            cache_dir: None,
        }
    }
}

fn default_repo() -> String {
    "unitary/toxic-bert".to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

/// Inference configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Device to run on (cpu, cuda, metal)
    #[serde(default = "default_device")]
    pub device: String,

    /// Maximum sequence length in tokens, special tokens included
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_max_length() -> usize {
    512
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            max_length: default_max_length(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Function turning logits into per-label scores
    #[serde(default)]
    pub activation: Activation,

    /// Label names by index; read from the model's `id2label` when empty
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Logit normalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Scores form one distribution summing to 1
    #[default]
    Softmax,
    /// Independent per-label scores (multi-label models)
    Sigmoid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_config() {
        let yaml = r#"
name: "toxic-bert"
source:
  type: huggingface
  repo: "unitary/toxic-bert"
  revision: "main"
inference:
  device: "cpu"
  max_length: 256
output:
  activation: sigmoid
  labels: [toxic, severe_toxic, obscene, threat, insult, identity_hate]
"#;

        let config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "toxic-bert");
        assert_eq!(config.inference.max_length, 256);
        assert_eq!(config.output.activation, Activation::Sigmoid);
        assert_eq!(config.output.labels.len(), 6);
    }

    #[test]
    fn test_defaults() {
        let config: ModelConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.inference.device, "cpu");
        assert_eq!(config.inference.max_length, 512);
        assert_eq!(config.output.activation, Activation::Softmax);
        assert!(config.output.labels.is_empty());
        assert_eq!(config.display_name(), "unitary/toxic-bert");
    }

    #[test]
    fn test_local_source() {
        let yaml = r#"
source:
  type: local
  path: "./models/my-model"
"#;

        let config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        match &config.source {
            ModelSource::Local { path } => {
                assert_eq!(path.to_str().unwrap(), "./models/my-model");
            }
            _ => panic!("Expected local source"),
        }
        assert_eq!(config.display_name(), "my-model");
    }

    #[test]
    fn test_unknown_source_type_rejected() {
        let yaml = r#"
source:
  type: s3
  bucket: models
"#;
        assert!(serde_yaml::from_str::<ModelConfig>(yaml).is_err());
    }
}

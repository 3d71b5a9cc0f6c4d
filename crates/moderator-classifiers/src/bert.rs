//! BERT sequence-classification provider backed by Candle

use crate::classifier::Classifier;
use crate::loader::{
    declared_num_labels, get_device, load_tokenizer, load_var_builder, parse_json_config,
    resolve_labels, resolve_model_path,
};
use crate::model_config::{Activation, ModelConfig};
use async_trait::async_trait;
use candle_core::{Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use moderator_core::{Error, LabelScores, Result};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;

fn candle_err(context: &'static str) -> impl Fn(candle_core::Error) -> Error {
    move |e| Error::classifier(format!("{}: {}", context, e))
}

/// Sequence classifier built from a BERT backbone, pooler and linear head.
///
/// Cloning is cheap; the loaded model is shared behind an `Arc`.
#[derive(Clone)]
pub struct BertSequenceClassifier {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    tokenizer: Tokenizer,
    model: BertModel,
    pooler: Option<Linear>,
    classifier: Linear,
    device: Device,
    labels: Vec<String>,
    activation: Activation,
}

impl BertSequenceClassifier {
    /// Load model, tokenizer and weights described by `config`.
    ///
    /// Blocking: may download from the HuggingFace Hub and reads weights
    /// from disk.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let name = config.display_name();
        tracing::info!("Loading classifier '{}'", name);

        let model_path = resolve_model_path(&config.source)?;
        let config_path = model_path.join("config.json");
        let raw_config: serde_json::Value = parse_json_config(&config_path)?;
        let bert_config: BertConfig = parse_json_config(&config_path)?;

        let num_labels = declared_num_labels(&raw_config)
            .or_else(|| Some(config.output.labels.len()).filter(|n| *n > 0))
            .ok_or_else(|| {
                Error::classifier(format!(
                    "Cannot determine label count for '{}': no id2label, num_labels or configured labels",
                    name
                ))
            })?;
        let labels = resolve_labels(&config.output.labels, &raw_config, num_labels);

        let tokenizer = load_tokenizer(&model_path, config.inference.max_length)?;
        let device = get_device(&config.inference.device)?;
        let vb = load_var_builder(&model_path, &device)?;

        let model = load_bert_backbone(&vb, &bert_config)?;
        let pooler = load_pooler(&vb, bert_config.hidden_size);
        let classifier =
            candle_nn::linear(bert_config.hidden_size, num_labels, vb.pp("classifier"))
                .map_err(candle_err("Failed to load classification head"))?;

        tracing::info!(
            "Loaded classifier '{}' with {} labels: {:?}",
            name,
            num_labels,
            labels
        );

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                tokenizer,
                model,
                pooler,
                classifier,
                device,
                labels,
                activation: config.output.activation,
            }),
        })
    }
}

impl Inner {
    fn scores(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::classifier(format!("Tokenization failed: {}", e)))?;

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err("Failed to create input tensor"))?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err("Failed to create token type tensor"))?;

        let hidden_states = self
            .model
            .forward(&input_ids, &token_type_ids, None)
            .map_err(candle_err("Model forward pass failed"))?;

        let cls_embedding = hidden_states
            .i((.., 0, ..))
            .map_err(candle_err("Failed to get CLS token"))?;

        let pooled = match &self.pooler {
            Some(pooler) => pooler
                .forward(&cls_embedding)
                .and_then(|t| t.tanh())
                .map_err(candle_err("Pooler failed"))?,
            None => cls_embedding,
        };

        let logits = self
            .classifier
            .forward(&pooled)
            .map_err(candle_err("Classification head failed"))?;

        activate(&logits, self.activation)
    }
}

/// Turn `(1, num_labels)` logits into per-label scores
pub fn activate(logits: &Tensor, activation: Activation) -> Result<Vec<f32>> {
    let scores = match activation {
        Activation::Softmax => candle_nn::ops::softmax(logits, D::Minus1),
        Activation::Sigmoid => candle_nn::ops::sigmoid(logits),
    }
    .map_err(candle_err("Activation failed"))?;

    scores
        .squeeze(0)
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(candle_err("Failed to read scores"))
}

fn load_bert_backbone(vb: &VarBuilder, config: &BertConfig) -> Result<BertModel> {
    let mut errors = Vec::new();

    for prefix in ["bert", ""] {
        let vb_prefix = if prefix.is_empty() {
            vb.clone()
        } else {
            vb.pp(prefix)
        };

        match BertModel::load(vb_prefix, config) {
            Ok(model) => {
                let effective_prefix = if prefix.is_empty() { "<root>" } else { prefix };
                tracing::debug!("Loaded BERT backbone from '{}'", effective_prefix);
                return Ok(model);
            }
            Err(e) => {
                errors.push(format!(
                    "{}: {}",
                    if prefix.is_empty() { "<root>" } else { prefix },
                    e
                ));
            }
        }
    }

    Err(Error::classifier(format!(
        "Failed to load BERT backbone with tried prefixes [{}]",
        errors.join(" | ")
    )))
}

fn load_pooler(vb: &VarBuilder, hidden_size: usize) -> Option<Linear> {
    for prefix in ["bert.pooler.dense", "pooler.dense"] {
        if let Ok(linear) = candle_nn::linear(hidden_size, hidden_size, vb.pp(prefix)) {
            tracing::debug!("Loaded pooler from '{}'", prefix);
            return Some(linear);
        }
    }
    tracing::warn!("No pooler weights found, classifying the raw CLS embedding");
    None
}

#[async_trait]
impl Classifier for BertSequenceClassifier {
    async fn classify(&self, text: &str) -> Result<LabelScores> {
        let start = Instant::now();
        let inner = Arc::clone(&self.inner);
        let owned = text.to_string();

        // forward passes are CPU-bound; keep them off the async workers
        let probs = tokio::task::spawn_blocking(move || inner.scores(&owned))
            .await
            .map_err(|e| Error::internal(format!("Inference task failed: {}", e)))??;

        let scores = LabelScores::from_parts(&self.inner.labels, &probs)?;
        tracing::debug!(
            model = %self.inner.name,
            latency_us = start.elapsed().as_micros() as u64,
            "Classified {} chars",
            text.len()
        );
        Ok(scores)
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn labels(&self) -> &[String] {
        &self.inner.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_activation_sums_to_one() {
        let logits = Tensor::new(&[[2.0f32, -1.0, 0.5]], &Device::Cpu).unwrap();
        let probs = activate(&logits, Activation::Softmax).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[2] && probs[2] > probs[1]);
    }

    #[test]
    fn test_sigmoid_activation_is_independent() {
        let logits = Tensor::new(&[[0.0f32, 4.0]], &Device::Cpu).unwrap();
        let probs = activate(&logits, Activation::Sigmoid).unwrap();
        assert!((probs[0] - 0.5).abs() < 1e-5);
        assert!(probs[1] > 0.98);
    }
}

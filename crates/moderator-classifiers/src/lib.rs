//! Moderator Classifiers
//!
//! Inference providers that score text against a fixed label set.
//!
//! The production provider runs a HuggingFace BERT sequence-classification
//! checkpoint (by default `unitary/toxic-bert`) on CPU through Candle.
//! Anything implementing [`Classifier`] can stand in for it.

pub mod bert;
pub mod classifier;
pub mod loader;
pub mod model_config;

pub use bert::BertSequenceClassifier;
pub use classifier::Classifier;
pub use model_config::{Activation, InferenceConfig, ModelConfig, ModelSource, OutputConfig};

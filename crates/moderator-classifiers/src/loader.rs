//! Model file resolution and loading helpers

use crate::model_config::ModelSource;
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use moderator_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokenizers::{Tokenizer, TruncationParams};

const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];
const TOKENIZER_FILES: [&str; 2] = ["tokenizer.json", "vocab.txt"];

/// Map a device name from configuration to a Candle device
pub fn get_device(device_str: &str) -> Result<Device> {
    match device_str.to_lowercase().as_str() {
        "cuda" | "cuda:0" => Device::new_cuda(0)
            .map_err(|e| Error::classifier(format!("Failed to initialize CUDA: {}", e))),
        "mps" | "metal" => Device::new_metal(0)
            .map_err(|e| Error::classifier(format!("Failed to initialize Metal: {}", e))),
        "cpu" => Ok(Device::Cpu),
        other => {
            tracing::warn!("Unknown device '{}', falling back to CPU", other);
            Ok(Device::Cpu)
        }
    }
}

/// Resolve the directory holding the model's files, downloading if needed
pub fn resolve_model_path(source: &ModelSource) -> Result<PathBuf> {
    match source {
        ModelSource::Local { path } => {
            if !path.is_dir() {
                return Err(Error::classifier(format!(
                    "Model path does not exist: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        ModelSource::HuggingFace {
            repo,
            revision,
            cache_dir,
        } => download_from_huggingface(repo, revision, cache_dir.as_deref()),
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("moderator")
        .join("models")
}

fn download_from_huggingface(
    repo: &str,
    revision: &str,
    cache_dir: Option<&Path>,
) -> Result<PathBuf> {
    tracing::info!("Fetching model from HuggingFace: {}@{}", repo, revision);

    let cache_dir = cache_dir.map(Path::to_path_buf).unwrap_or_else(default_cache_dir);
    std::fs::create_dir_all(&cache_dir)?;

    let api = hf_hub::api::sync::ApiBuilder::new()
        .with_cache_dir(cache_dir)
        .build()
        .map_err(|e| Error::classifier(format!("Failed to initialize HuggingFace API: {}", e)))?;

    let repo_obj = api.repo(hf_hub::Repo::with_revision(
        repo.to_string(),
        hf_hub::RepoType::Model,
        revision.to_string(),
    ));

    let config_path = repo_obj
        .get("config.json")
        .map_err(|e| Error::classifier(format!("Failed to download config.json: {}", e)))?;

    fetch_first(&WEIGHT_FILES, |file| repo_obj.get(file).ok())
        .ok_or_else(|| {
            Error::classifier(format!(
                "No model weights found (tried {})",
                WEIGHT_FILES.join(", ")
            ))
        })?;

    fetch_first(&TOKENIZER_FILES, |file| repo_obj.get(file).ok())
        .ok_or_else(|| {
            Error::classifier(format!(
                "No tokenizer found (tried {})",
                TOKENIZER_FILES.join(", ")
            ))
        })?;

    let model_dir = config_path
        .parent()
        .ok_or_else(|| Error::classifier("Invalid cache path"))?;

    tracing::info!("Model available at: {}", model_dir.display());
    Ok(model_dir.to_path_buf())
}

fn fetch_first(
    files: &[&str],
    mut fetch: impl FnMut(&str) -> Option<PathBuf>,
) -> Option<PathBuf> {
    files.iter().find_map(|file| {
        let found = fetch(file);
        if found.is_some() {
            tracing::debug!("Found model file: {}", file);
        }
        found
    })
}

/// Read and deserialize a JSON file
pub fn parse_json_config<T: DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::classifier(format!(
            "Failed to read config {}: {}",
            config_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::classifier(format!(
            "Failed to parse config {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Load the tokenizer, truncating encodings to `max_length` tokens.
///
/// Prefers `tokenizer.json`; builds a BERT WordPiece tokenizer from
/// `vocab.txt` otherwise.
pub fn load_tokenizer(model_path: &Path, max_length: usize) -> Result<Tokenizer> {
    let mut tokenizer = build_tokenizer(model_path)?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| Error::classifier(format!("Failed to configure truncation: {}", e)))?;
    tokenizer.with_padding(None);

    Ok(tokenizer)
}

fn build_tokenizer(model_path: &Path) -> Result<Tokenizer> {
    let tokenizer_json_path = model_path.join("tokenizer.json");
    if tokenizer_json_path.exists() {
        tracing::debug!("Loading tokenizer from tokenizer.json");
        return Tokenizer::from_file(&tokenizer_json_path)
            .map_err(|e| Error::classifier(format!("Failed to load tokenizer.json: {}", e)));
    }

    let vocab_path = model_path.join("vocab.txt");
    if vocab_path.exists() {
        tracing::debug!("Building tokenizer from vocab.txt");

        use tokenizers::models::wordpiece::WordPiece;
        use tokenizers::normalizers::BertNormalizer;
        use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
        use tokenizers::processors::bert::BertProcessing;

        let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(|e| Error::classifier(format!("Failed to build WordPiece model: {}", e)))?;

        let mut tokenizer = Tokenizer::new(wordpiece);
        tokenizer.with_normalizer(Some(BertNormalizer::default()));
        tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));

        let special_id = |token: &str| {
            tokenizer.token_to_id(token).ok_or_else(|| {
                Error::classifier(format!("vocab.txt is missing special token {}", token))
            })
        };
        let sep = ("[SEP]".to_string(), special_id("[SEP]")?);
        let cls = ("[CLS]".to_string(), special_id("[CLS]")?);
        tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));

        return Ok(tokenizer);
    }

    Err(Error::classifier(format!(
        "No tokenizer found in {} (tried {})",
        model_path.display(),
        TOKENIZER_FILES.join(", ")
    )))
}

/// Open model weights, preferring safetensors over a PyTorch checkpoint
pub fn load_var_builder(model_path: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_path.join(WEIGHT_FILES[0]);
    if safetensors.exists() {
        // SAFETY: the weights file is not modified while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)
                .map_err(|e| Error::classifier(format!("Failed to load weights: {}", e)))?
        };
        return Ok(vb);
    }

    let checkpoint = model_path.join(WEIGHT_FILES[1]);
    if checkpoint.exists() {
        tracing::debug!("Loading weights from PyTorch checkpoint");
        return VarBuilder::from_pth(&checkpoint, DType::F32, device)
            .map_err(|e| Error::classifier(format!("Failed to load weights: {}", e)));
    }

    Err(Error::classifier(format!(
        "No model weights found in {} (tried {})",
        model_path.display(),
        WEIGHT_FILES.join(", ")
    )))
}

/// Resolve label names by index.
///
/// Configured labels win; otherwise the model's `id2label` is used. Missing
/// indices are filled with `label_<i>`.
pub fn resolve_labels(
    configured: &[String],
    model_config: &serde_json::Value,
    num_labels: usize,
) -> Vec<String> {
    let mut labels: Vec<String> = if !configured.is_empty() {
        configured.iter().take(num_labels).cloned().collect()
    } else {
        let id2label = model_config.get("id2label").and_then(|v| v.as_object());
        (0..num_labels)
            .map(|idx| {
                id2label
                    .and_then(|map| map.get(&idx.to_string()))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("label_{}", idx))
            })
            .collect()
    };

    for idx in labels.len()..num_labels {
        labels.push(format!("label_{}", idx));
    }
    labels
}

/// Number of output labels declared by a HuggingFace `config.json`
pub fn declared_num_labels(model_config: &serde_json::Value) -> Option<usize> {
    model_config
        .get("id2label")
        .and_then(|v| v.as_object())
        .map(|m| m.len())
        .filter(|n| *n > 0)
        .or_else(|| {
            model_config
                .get("num_labels")
                .and_then(|v| v.as_u64())
                .map(|n| n as usize)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_labels_from_id2label() {
        let config = json!({ "id2label": { "1": "toxic", "0": "non-toxic" } });
        let labels = resolve_labels(&[], &config, 2);
        assert_eq!(labels, vec!["non-toxic", "toxic"]);
    }

    #[test]
    fn test_configured_labels_take_precedence() {
        let config = json!({ "id2label": { "0": "LABEL_0", "1": "LABEL_1" } });
        let configured = vec!["ok".to_string(), "toxic".to_string()];
        assert_eq!(resolve_labels(&configured, &config, 2), configured);
    }

    #[test]
    fn test_missing_labels_are_filled() {
        let labels = resolve_labels(&["toxic".to_string()], &json!({}), 3);
        assert_eq!(labels, vec!["toxic", "label_1", "label_2"]);
    }

    #[test]
    fn test_declared_num_labels() {
        assert_eq!(
            declared_num_labels(&json!({ "id2label": { "0": "a", "1": "b", "2": "c" } })),
            Some(3)
        );
        assert_eq!(declared_num_labels(&json!({ "num_labels": 6 })), Some(6));
        assert_eq!(declared_num_labels(&json!({})), None);
    }

    #[test]
    fn test_missing_local_path() {
        let source = ModelSource::Local {
            path: PathBuf::from("/nonexistent/moderator-model"),
        };
        assert!(resolve_model_path(&source).is_err());
    }

    #[test]
    fn test_unknown_device_falls_back_to_cpu() {
        assert!(matches!(get_device("tpu").unwrap(), Device::Cpu));
    }

    #[test]
    fn test_no_tokenizer_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tokenizer(dir.path(), 16).unwrap_err();
        assert!(err.to_string().contains("No tokenizer found"));
    }
}

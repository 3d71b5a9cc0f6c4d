//! Server configuration

use moderator_classifiers::{ModelConfig, ModelSource};
use moderator_core::Threshold;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Log filter used when neither `RUST_LOG` nor `logging.filter` is set
pub const DEFAULT_LOG_FILTER: &str =
    "moderator_server=info,moderator_classifiers=info,moderator_core=info";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Probability above which text is flagged toxic
    #[serde(default)]
    pub threshold: Threshold,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sequence-classification model
    #[serde(default)]
    pub model: ModelConfig,
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<String>,
    pub port: Option<u16>,
    pub threshold: Option<f32>,
    pub model_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load(config_path: impl AsRef<Path>, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let config_path = config_path.as_ref();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content).map_err(|e| {
                anyhow::anyhow!("Invalid config file {}: {}", config_path.display(), e)
            })?
        } else {
            tracing::debug!(
                "Config file {} not found, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply(overrides)?;
        Ok(config)
    }

    fn apply(&mut self, overrides: &ConfigOverrides) -> anyhow::Result<()> {
        if let Some(listen) = &overrides.listen {
            self.listen = listen.clone();
        }

        if let Some(port) = overrides.port {
            self.port = port;
        }

        if let Some(threshold) = overrides.threshold {
            self.threshold = Threshold::new(threshold)?;
        }

        if let Some(path) = &overrides.model_path {
            self.model.source = ModelSource::Local { path: path.clone() };
        }

        Ok(())
    }

    /// Socket address to bind; `listen` must be an IPv4 or IPv6 address
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .listen
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address '{}': {}", self.listen, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            threshold: Threshold::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

/// Cross-origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Attach CORS headers at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Allowed origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Configured filter directive, or [`DEFAULT_LOG_FILTER`]
    pub fn filter_directive(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_file_missing() {
        let config =
            ServerConfig::load("/nonexistent/moderator.yaml", &ConfigOverrides::default()).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.threshold, Threshold::new(0.7).unwrap());
        assert!(config.cors.enabled);
        assert!(config.cors.allowed_origins.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
port: 9000
threshold: 0.6
cors:
  allowed_origins: ["http://localhost:3000"]
logging:
  json: true
model:
  name: toxic-bert
  inference:
    max_length: 128
"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path(), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.threshold.value(), 0.6);
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:3000"]);
        assert!(config.logging.json);
        assert_eq!(config.model.inference.max_length, 128);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threshold: 0.6\nport: 9000").unwrap();

        let overrides = ConfigOverrides {
            port: Some(8081),
            threshold: Some(0.8),
            model_path: Some(PathBuf::from("/models/toxic-bert")),
            ..Default::default()
        };
        let config = ServerConfig::load(file.path(), &overrides).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.threshold.value(), 0.8);
        assert_eq!(
            config.model.source,
            ModelSource::Local {
                path: PathBuf::from("/models/toxic-bert")
            }
        );
    }

    #[test]
    fn test_example_config_parses() {
        let example = include_str!("../../../moderator.example.yaml");
        let config: ServerConfig = serde_yaml::from_str(example).unwrap();
        assert_eq!(config.threshold, Threshold::DEFAULT);
        assert_eq!(config.model.display_name(), "toxic-bert");
    }

    #[test]
    fn test_misspelled_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "treshold: 0.6").unwrap();
        let err = ServerConfig::load(file.path(), &ConfigOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("treshold"), "{}", err);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cors:\n  allow_origins: [\"*\"]").unwrap();
        assert!(ServerConfig::load(file.path(), &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_bind_addr_ipv4_and_ipv6() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr().unwrap(), "0.0.0.0:8000".parse().unwrap());

        let overrides = ConfigOverrides {
            listen: Some("::".to_string()),
            port: Some(8081),
            ..Default::default()
        };
        let config = ServerConfig::load("/nonexistent.yaml", &overrides).unwrap();
        assert_eq!(config.bind_addr().unwrap(), "[::]:8081".parse().unwrap());

        let config = ServerConfig {
            listen: "not-an-ip".to_string(),
            ..Default::default()
        };
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_log_filter_directive() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.filter_directive(), DEFAULT_LOG_FILTER);

        let logging = LoggingConfig {
            filter: Some("moderator_server=debug".to_string()),
            ..Default::default()
        };
        assert_eq!(logging.filter_directive(), "moderator_server=debug");
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threshold: 1.7").unwrap();
        assert!(ServerConfig::load(file.path(), &ConfigOverrides::default()).is_err());

        let overrides = ConfigOverrides {
            threshold: Some(-0.1),
            ..Default::default()
        };
        assert!(ServerConfig::load("/nonexistent.yaml", &overrides).is_err());
    }
}

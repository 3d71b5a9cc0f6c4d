//! Shared application state

use crate::config::ServerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use moderator_classifiers::Classifier;
use moderator_core::Threshold;
use std::sync::Arc;

/// Application state shared across all requests.
///
/// Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,

    /// Inference provider, loaded once
    pub classifier: Arc<dyn Classifier>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        classifier: Arc<dyn Classifier>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            classifier,
            metrics_handle,
        }
    }

    pub fn threshold(&self) -> Threshold {
        self.config.threshold
    }
}

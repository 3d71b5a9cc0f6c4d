//! Moderator Server
//!
//! Loads a pretrained sequence-classification model once and serves
//! toxicity moderation over HTTP.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use moderator_classifiers::{BertSequenceClassifier, Classifier};
use moderator_server::{create_router, AppState, ConfigOverrides, LoggingConfig, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "moderator-server")]
#[command(about = "Text toxicity moderation service", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MODERATOR_CONFIG", default_value = "moderator.yaml")]
    config: PathBuf,

    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Toxicity threshold in [0, 1]
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Local model directory (overrides the configured source)
    #[arg(short, long)]
    model_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen: self.listen.clone(),
            port: self.port,
            threshold: self.threshold,
            model_path: self.model_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ServerConfig::load(&cli.config, &cli.overrides())?;

    init_tracing(cli.verbose, &config.logging);

    info!("Starting Moderator Server");
    info!("Threshold: {}", config.threshold);
    info!(
        "CORS: {}",
        match (config.cors.enabled, config.cors.allowed_origins.is_empty()) {
            (false, _) => "disabled".to_string(),
            (true, true) => "any origin".to_string(),
            (true, false) => config.cors.allowed_origins.join(", "),
        }
    );

    let metrics_handle = init_metrics()?;

    // Model loading reads (and may download) weights; keep it off the runtime
    let model_config = config.model.clone();
    let classifier = tokio::task::spawn_blocking(move || BertSequenceClassifier::load(&model_config))
        .await??;
    info!(
        "Model '{}' ready with labels {:?}",
        classifier.name(),
        classifier.labels()
    );

    let addr = config.bind_addr()?;
    let state = AppState::new(config, Arc::new(classifier), metrics_handle);
    let app = create_router(state)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            warn!("Shutdown signal received, stopping server...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("moderator_server=debug,moderator_classifiers=debug,moderator_core=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()))
    };

    let (plain, json) = if logging.json {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "moderator_requests_total",
        "Total number of moderation requests received"
    );
    metrics::describe_counter!(
        "moderator_toxic_total",
        "Total number of requests flagged toxic"
    );
    metrics::describe_counter!("moderator_errors_total", "Total number of errors by type");
    metrics::describe_histogram!(
        "moderator_inference_latency_us",
        metrics::Unit::Microseconds,
        "Inference latency in microseconds"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}

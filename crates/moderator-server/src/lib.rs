//! Moderator Server
//!
//! HTTP moderation service: text in, per-label probabilities and a toxicity
//! flag out.
//!
//! - `POST /moderate` classifies `{"text": ...}`
//! - `GET /` liveness message
//! - `GET /health` model and threshold in use
//! - `GET /metrics` Prometheus metrics

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ConfigOverrides, CorsConfig, LoggingConfig, ServerConfig};
pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;

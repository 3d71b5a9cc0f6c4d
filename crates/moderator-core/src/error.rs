//! Error types for Moderator

/// Result type alias using Moderator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Moderator operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The inference provider returned no labels
    #[error("no labels: inference provider returned an empty label set")]
    NoLabels,

    /// Label scores are not probabilities in `[0, 1]` or do not match the labels
    #[error("invalid scores: {0}")]
    InvalidScores(String),

    /// Classifier loading or execution errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was caused by the provider's output rather than
    /// by the provider failing to run.
    pub fn is_output_error(&self) -> bool {
        matches!(self, Self::NoLabels | Self::InvalidScores(_))
    }
}

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Browser manager is not initialized, call initialize() first")]
    NotInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Invalid bridge message: {0}")]
    InvalidMessage(String),

    #[error("Bridge message decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid callback function name: {0:?}")]
    InvalidCallbackName(String),

    #[error("Session command channel closed")]
    ChannelClosed,

    #[error("Session has been closed")]
    SessionClosed,
}

/// Result type alias for browser session operations
pub type Result<T> = std::result::Result<T, BrowserError>;

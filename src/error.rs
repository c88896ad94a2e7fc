//! Error types shared by the API client and the playback layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP error: {0}")]
    Status(u16),
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected response shape: expected {0}")]
    Shape(&'static str),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to launch player '{player}': {source}")]
    Spawn {
        player: String,
        #[source]
        source: std::io::Error,
    },
    #[error("player reported error code {0}")]
    Engine(u16),
}

impl PlaybackError {
    /// Numeric code fed into the playback state machine
    pub fn code(&self) -> u16 {
        match self {
            // Player binary missing or not executable
            PlaybackError::Spawn { .. } => 0,
            PlaybackError::Engine(code) => *code,
        }
    }
}

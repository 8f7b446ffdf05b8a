use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the search API.
///
/// Any of these ends an exchange with the generic error message; the server's
/// own `success: false` replies are not errors and never show up here.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response (status {status}): {source}")]
    Decode {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },

    #[error("request task ended unexpectedly: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Join(err.to_string())
    }
}

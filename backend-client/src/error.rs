//! Error types for the backend clients.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend returned invalid data: {0}")]
    InvalidData(String),

    #[error("Engine returned no move")]
    NoMove,

    #[error("Mock response not configured for: {0}")]
    NotConfigured(String),
}

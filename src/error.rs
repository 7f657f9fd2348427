use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Request aborted")]
    Aborted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, TranslateError>;

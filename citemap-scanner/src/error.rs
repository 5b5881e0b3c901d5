use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Blocked by anti-bot check at {url}")]
    Blocked { url: String },

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, ScanError::Blocked { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        Error::Extraction(msg.into())
    }
}

/// Failures of a single call to the generation endpoint. These never abort
/// a run; the orchestrator turns them into a failed reply.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("endpoint returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not decode reply: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RequestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RequestError::Timeout
        } else if e.is_decode() {
            RequestError::Decode(e.to_string())
        } else {
            RequestError::Transport(e.to_string())
        }
    }
}

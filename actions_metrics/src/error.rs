use thiserror::Error;

/// Failure while locating or downloading a job log.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("log location response carried no usable Location header")]
    MissingLocation,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("API base URL cannot carry a path: {0}")]
    InvalidBaseUrl(String),

    #[error("event carries no repository owner/name to look the log up with")]
    MissingIdentity,
}

pub type Result<T> = std::result::Result<T, LogError>;

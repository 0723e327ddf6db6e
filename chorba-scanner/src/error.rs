use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid path pattern for host {host}: {source}")]
    InvalidPattern {
        host: String,
        #[source]
        source: regex::Error,
    },

    #[error("Max depth {max_depth} reached at {url}")]
    DepthExceeded { url: String, max_depth: usize },
}

pub type Result<T> = std::result::Result<T, ScanError>;

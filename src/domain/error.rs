use reqwest::header::HeaderMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("HTTP {status}: {detail}")]
    Http {
        status: u16,
        detail: String,
        headers: Box<HeaderMap>,
    },

    #[error("request to {url} timed out after {timeout_secs} seconds; increase the `timeout` argument or set KB_CLIENT_TIMEOUT")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("upload error: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KnowledgeError {
    pub fn status(&self) -> Option<u16> {
        match self {
            KnowledgeError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

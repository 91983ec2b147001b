use std::time::Duration;

/// Represents the possible errors that can occur when talking to the object generation API.
#[derive(Debug, thiserror::Error)]
pub enum ObjgenError {
    /// The API answered with a non-success status or a `success: false` envelope.
    #[error("API request failed ({status}): {message}")]
    Request { status: u16, message: String },
    /// The object polled by the wait loop does not exist.
    #[error("Object not found: {message}")]
    NotFound { message: String },
    /// The version's task reached the `failed` status.
    #[error("Generation failed: {message}")]
    GenerationFailed { message: String },
    /// The overall wait deadline elapsed before the version became final.
    #[error("Overall timeout reached ({limit:?})")]
    Timeout { limit: Duration },
    /// A successful response carried a body that is not JSON.
    #[error("Non-JSON response: {snippet:?}")]
    Decode { snippet: String },
    #[error("Base URL cannot carry path segments: {0}")]
    InvalidBaseUrl(String),
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse API response: {0}")]
    ResponseParseFailed(#[from] serde_json::Error),
    #[error("URL parsing failed: {0}")]
    UrlParseFailed(#[from] url::ParseError),
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ObjgenError {
    /// The HTTP status attached to the error, when the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ObjgenError::Request { status, .. } => Some(*status),
            ObjgenError::NotFound { .. } => Some(404),
            ObjgenError::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

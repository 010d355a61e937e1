use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the clients, the ledger and the credential loader.
///
/// Every variant carries the operation that produced it so a single log line
/// is enough to tell which request or file went wrong.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("{op}: request to {url} failed: {source}")]
    Transport {
        op: &'static str,
        url: String,
        source: reqwest::Error,
    },

    #[error("{op}: {url} answered with HTTP {status}")]
    Status {
        op: &'static str,
        url: String,
        status: u16,
    },

    #[error("{op}: API error {code}: {message}")]
    Api {
        op: &'static str,
        code: i64,
        message: String,
    },

    #[error("{op}: {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{op}: malformed JSON: {source}")]
    Json {
        op: &'static str,
        source: serde_json::Error,
    },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("photo {photo_id} has no size variants")]
    NoSizeVariants { photo_id: i64 },

    #[error("token file {0} is empty")]
    InvalidToken(PathBuf),

    #[error("token cannot be used as a header value")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl BackupError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackupError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

//! Error type shared by every stage of a download.
use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can stop a download.
///
/// Workers never retry: the first error observed by the engine is returned
/// to the caller and the output file should be treated as incomplete.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request could not be built, sent, or answered.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Nothing sensible can be downloaded with the probed length.
    #[error("cannot plan download: {0}")]
    Planning(String),

    #[error("server responded with {status} to the range request of worker {worker_id}, expected 206")]
    ServerContract { worker_id: usize, status: StatusCode },

    /// The server answered with a body that does not fit the requested range.
    #[error("worker {worker_id} requested {expected} bytes, server sent {actual}")]
    RangeMismatch {
        worker_id: usize,
        expected: u64,
        actual: u64,
    },

    /// The storage accepted fewer bytes than it was handed.
    #[error("worker {worker_id} wrote {written} of {expected} bytes to the output")]
    ShortWrite {
        worker_id: usize,
        written: usize,
        expected: usize,
    },

    /// The connection ended before the promised bytes arrived.
    #[error("worker {worker_id} received {received} bytes, server declared {declared}")]
    TruncatedTransfer {
        worker_id: usize,
        received: u64,
        declared: u64,
    },

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("download cancelled")]
    Cancelled,

    #[error("worker task panicked: {0}")]
    WorkerPanicked(String),
}

impl From<tokio::task::JoinError> for DownloadError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            DownloadError::Cancelled
        } else {
            DownloadError::WorkerPanicked(err.to_string())
        }
    }
}

pub type Result<T, E = DownloadError> = std::result::Result<T, E>;

use thiserror::Error;

/// Failure taxonomy for the fetch pipeline.
///
/// During a normal run every per-batch error is absorbed by the runner and
/// becomes an empty batch result; only `recover` surfaces these to the caller.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}")]
    Transport { status: reqwest::StatusCode },
    #[error("no report table in response")]
    TableNotFound,
    #[error("report table has no header row")]
    HeaderNotFound,
    #[error("batch {index} out of range (run has {batches} batches)")]
    OutOfRange { index: usize, batches: usize },
}

impl ScrapeError {
    /// True for network-level failures (bad status, timeout, connect error).
    pub fn is_transport(&self) -> bool {
        matches!(self, ScrapeError::Http(_) | ScrapeError::Transport { .. })
    }
}

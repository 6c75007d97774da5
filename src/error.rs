use crate::models::EntityKind;

/// Errors produced by the remote list API transport.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx status code from the API.
    #[error("HTTP error: status={status}, body={body}")]
    Http { status: u16, body: String },

    /// The token was rejected (401) or lacks access to the organization (404 on TFE).
    #[error("unauthorized: status={status}")]
    Unauthorized { status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Free-form failure, used by in-memory implementations of the API.
    #[error("{0}")]
    Other(String),
}

/// Errors that abort (part of) a collection cycle.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// A page fetch failed.
    #[error("{kind} list failed: {source} (organization={organization}, page={page})")]
    RemoteList {
        kind: EntityKind,
        organization: String,
        page: u32,
        #[source]
        source: ApiError,
    },

    #[error("context cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The consumer side of the sample sink went away.
    #[error("sample sink closed")]
    SinkClosed,

    #[error("metric {metric} expects {expected} labels, got {got}")]
    InvalidSample {
        metric: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("worker task failed: {0}")]
    WorkerPanicked(String),
}

impl CollectError {
    /// True for the conditions raised by the shared cancellation signal.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, CollectError>;

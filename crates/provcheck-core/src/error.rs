//! Error taxonomy for hashing, manifest fetch and verification.
//!
//! Every variant is scoped to the single request that produced it; none of
//! them is fatal to the process.

use crate::http::FetchError;

/// Failure of a hashing or manifest-fetch task.
///
/// `Mismatched` and `Unavailable` verification outcomes are not errors and
/// never appear here.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The byte source failed (or came up short) while reading the chunk at `offset`.
    #[error("read failed at offset {offset}")]
    Read {
        offset: u64,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Cooperative cancellation was honored.
    #[error("verification cancelled")]
    Cancelled,

    /// The server answered outside the 2xx range.
    #[error("HTTP {status}")]
    Http { status: u32, body: Option<String> },

    /// No response (connect failure, DNS, timeout, dropped connection).
    #[error("transport error: {0}")]
    Transport(String),

    /// A 2xx response carried a body that is not a valid manifest.
    #[error("malformed manifest: {0}")]
    Parse(String),

    /// Chunk size must be non-zero.
    #[error("invalid chunk size {0}")]
    InvalidChunkSize(usize),
}

impl VerifyError {
    pub(crate) fn read_at(offset: u64, source: std::io::Error) -> Self {
        VerifyError::Read {
            offset,
            source: Some(source),
        }
    }

    pub(crate) fn short_read(offset: u64) -> Self {
        VerifyError::Read {
            offset,
            source: None,
        }
    }

    /// True for `Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, VerifyError::Cancelled)
    }
}

impl From<FetchError> for VerifyError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Http { status, body, .. } => VerifyError::Http { status, body },
            FetchError::Transport(msg) => VerifyError::Transport(msg),
            FetchError::Parse(msg) => VerifyError::Parse(msg),
            FetchError::Cancelled => VerifyError::Cancelled,
        }
    }
}

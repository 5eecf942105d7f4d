//! Error type shared by every facade operation.

use std::fmt;

/// Bodies stored on `FetchError::Http` are cut to this many bytes.
pub(crate) const MAX_ERROR_BODY: usize = 4096;

/// Failure of a single HTTP call.
#[derive(Debug)]
pub enum FetchError {
    /// Response status outside 2xx. `context` carries the caller's message
    /// for `fetch_json_with_error`.
    Http {
        status: u32,
        body: Option<String>,
        context: Option<String>,
    },
    /// No response: connect/DNS failure, timeout, connection dropped.
    Transport(String),
    /// 2xx response whose body could not be decoded.
    Parse(String),
    /// The request's cancel token fired.
    Cancelled,
}

impl FetchError {
    /// HTTP status for `Http` errors.
    pub fn status(&self) -> Option<u32> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn transport(e: curl::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Http {
                status,
                context: Some(msg),
                ..
            } => write!(f, "{}: HTTP {}", msg, status),
            FetchError::Http { status, .. } => write!(f, "HTTP {}", status),
            FetchError::Transport(msg) => write!(f, "transport error: {}", msg),
            FetchError::Parse(msg) => write!(f, "parse error: {}", msg),
            FetchError::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Lossy UTF-8 view of an error body, truncated; `None` when empty.
pub(crate) fn error_body(raw: &[u8]) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let cut = &raw[..raw.len().min(MAX_ERROR_BODY)];
    Some(String::from_utf8_lossy(cut).into_owned())
}

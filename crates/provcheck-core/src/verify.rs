//! One verification request: hash the local bytes and fetch the manifest
//! concurrently, wait for both, then compare.
//!
//! ```text
//! NotRequested -> InFlight{hashing, fetching} -> Comparing -> Verified
//!                                                           | Mismatched
//!                                                           | Unavailable
//!                                                           | Failed
//! ```
//!
//! A `Verification` is consumed by `run`; every request gets a fresh one, so
//! nothing is shared between files or requests except what the caller passes in.

use std::fmt;

use tokio::sync::watch;

use crate::control::CancelToken;
use crate::error::VerifyError;
use crate::hasher::ChunkedHasher;
use crate::provenance::{ManifestOutcome, ManifestRecord, ProvenanceClient};
use crate::source::ByteSource;

/// Terminal outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Manifest present and its digest equals the local one.
    Verified,
    /// Manifest present but the digests differ.
    Mismatched,
    /// Server has no manifest for this path.
    Unavailable,
    /// Hashing or manifest fetch failed (see `VerificationResult::error`).
    Failed,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Mismatched => "mismatched",
            VerificationStatus::Unavailable => "unavailable",
            VerificationStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Lifecycle state, observable through `Verification::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    NotRequested,
    /// Both tasks started; each flag stays true until that task settles.
    InFlight { hashing: bool, fetching: bool },
    Comparing,
    Done(VerificationStatus),
}

impl VerifyState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerifyState::Done(_))
    }
}

/// Outcome of one request.
///
/// `status == Verified` iff a manifest was present and both digests are
/// present and equal ignoring ASCII case.
#[derive(Debug)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub local_digest: Option<String>,
    pub remote_digest: Option<String>,
    pub manifest: Option<ManifestRecord>,
    pub error: Option<VerifyError>,
}

/// Decide the terminal result once both tasks have settled.
///
/// A hashing error wins over a fetch error; `Absent` beats digest comparison.
pub fn resolve(
    hash: Result<String, VerifyError>,
    manifest: Result<ManifestOutcome, VerifyError>,
) -> VerificationResult {
    let (local_digest, hash_err) = match hash {
        Ok(d) => (Some(d), None),
        Err(e) => (None, Some(e)),
    };
    let (outcome, fetch_err) = match manifest {
        Ok(o) => (Some(o), None),
        Err(e) => (None, Some(e)),
    };
    let record = outcome.as_ref().and_then(ManifestOutcome::record).cloned();
    let remote_digest = record.as_ref().map(|r| r.hex_digest.clone());

    if let Some(error) = hash_err.or(fetch_err) {
        return VerificationResult {
            status: VerificationStatus::Failed,
            local_digest,
            remote_digest,
            manifest: record,
            error: Some(error),
        };
    }

    let status = match (&record, &local_digest, &remote_digest) {
        (Some(_), Some(local), Some(remote)) if local.eq_ignore_ascii_case(remote) => {
            VerificationStatus::Verified
        }
        (Some(_), _, _) => VerificationStatus::Mismatched,
        (None, _, _) => VerificationStatus::Unavailable,
    };

    VerificationResult {
        status,
        local_digest,
        remote_digest,
        manifest: record,
        error: None,
    }
}

/// Verification of one file against its manifest.
pub struct Verification {
    path: String,
    hasher: ChunkedHasher,
    cancel: CancelToken,
    state: watch::Sender<VerifyState>,
}

impl Verification {
    /// `path` is the resource path on the server (`/docs/report.pdf`).
    pub fn new(path: impl Into<String>) -> Self {
        let (state, _) = watch::channel(VerifyState::NotRequested);
        Self {
            path: path.into(),
            hasher: ChunkedHasher::default(),
            cancel: CancelToken::new(),
            state,
        }
    }

    pub fn with_hasher(mut self, hasher: ChunkedHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Use a token from a `VerifyControl` (or any caller-held token).
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Token that cancels this request (both hashing and fetch).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> VerifyState {
        *self.state.borrow()
    }

    /// Receiver for state transitions. Stays readable after `run` returns.
    pub fn subscribe(&self) -> watch::Receiver<VerifyState> {
        self.state.subscribe()
    }

    /// Run the request to a terminal result. `on_progress` receives hash progress in [0, 1].
    pub async fn run<S, P>(
        self,
        source: &S,
        client: &ProvenanceClient,
        on_progress: P,
    ) -> VerificationResult
    where
        S: ByteSource,
        P: FnMut(f64),
    {
        tracing::debug!(path = %self.path, len = source.total_length(), "verification started");
        self.transition(VerifyState::InFlight {
            hashing: true,
            fetching: true,
        });

        let hashing = async {
            let r = self
                .hasher
                .read_all_with(source, on_progress, Some(&self.cancel))
                .await;
            self.settle(|hashing, _| *hashing = false);
            r
        };
        let fetching = async {
            let r = client
                .fetch_manifest_cancellable(&self.path, &self.cancel)
                .await;
            self.settle(|_, fetching| *fetching = false);
            r
        };
        let (hash, manifest) = tokio::join!(hashing, fetching);

        self.transition(VerifyState::Comparing);
        let result = resolve(hash, manifest);
        self.transition(VerifyState::Done(result.status));

        match &result.error {
            Some(e) => tracing::info!(path = %self.path, status = %result.status, error = %e, "verification finished"),
            None => tracing::info!(path = %self.path, status = %result.status, "verification finished"),
        }
        result
    }

    fn transition(&self, next: VerifyState) {
        tracing::trace!(path = %self.path, state = ?next, "verification state");
        self.state.send_replace(next);
    }

    fn settle(&self, f: impl FnOnce(&mut bool, &mut bool)) {
        self.state.send_modify(|s| {
            if let VerifyState::InFlight { hashing, fetching } = s {
                f(hashing, fetching);
            }
        });
    }
}

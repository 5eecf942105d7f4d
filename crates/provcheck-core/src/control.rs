//! Per-request cancellation: tokens and a registry keyed by request id.
//!
//! Each verification request gets its own `CancelToken`. The hasher checks it
//! before every chunk and races it against the pending read; the HTTP facade
//! hands it to libcurl's progress callback. A `VerifyControl` lets a UI cancel
//! one request by id without touching any other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag shared between a request and its tasks.
///
/// Cloning shares the flag. Cancellation is sticky.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every task waiting in `cancelled()`.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel()` has been called (immediately if it already was).
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel() is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Shared registry of request id -> cancel token.
///
/// Holds tokens only; results stay with the request that produced them.
#[derive(Default)]
pub struct VerifyControl {
    requests: RwLock<HashMap<u64, CancelToken>>,
}

impl VerifyControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request; returns the token to pass to its verification.
    pub fn register(&self, request_id: u64) -> CancelToken {
        let token = CancelToken::new();
        self.requests
            .write()
            .unwrap()
            .insert(request_id, token.clone());
        token
    }

    /// Unregister a request (call when it finishes, whatever the outcome).
    pub fn unregister(&self, request_id: u64) {
        self.requests.write().unwrap().remove(&request_id);
    }

    /// Cancel one request. Returns false if the id is not registered.
    pub fn cancel(&self, request_id: u64) -> bool {
        match self.requests.read().unwrap().get(&request_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered request. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let requests = self.requests.read().unwrap();
        for token in requests.values() {
            token.cancel();
        }
        requests.len()
    }

    pub fn in_flight(&self) -> usize {
        self.requests.read().unwrap().len()
    }
}

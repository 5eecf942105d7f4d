//! Typed HTTP calls with one error taxonomy.
//!
//! `HttpFetch` is the only network egress of the crate. Every operation maps a
//! response outside 2xx to `FetchError::Http` (except `fetch_status`, which
//! reports it as `false`) and a missing response to `FetchError::Transport`.
//! Transfers use the curl crate (libcurl) on tokio's blocking pool, so no
//! async worker thread ever blocks on the network.

mod error;
mod perform;

pub use error::FetchError;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ProvcheckConfig;
use crate::control::CancelToken;
use perform::{perform, secs_or, RawResponse};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport settings. These timeouts are the only ones in the subsystem.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
    /// Extra request headers (e.g. auth) sent with every call.
    pub headers: HashMap<String, String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: Some(concat!("provcheck/", env!("CARGO_PKG_VERSION")).to_string()),
            headers: HashMap::new(),
        }
    }
}

impl HttpOptions {
    pub fn from_config(cfg: &ProvcheckConfig) -> Self {
        let mut opts = Self {
            connect_timeout: secs_or(cfg.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT),
            request_timeout: secs_or(cfg.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT),
            ..Self::default()
        };
        if let Some(http) = &cfg.http {
            if http.user_agent.is_some() {
                opts.user_agent = http.user_agent.clone();
            }
            opts.headers = http.headers.clone();
        }
        opts
    }
}

/// Verb for `fetch_mutation`. Reads always use GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// HTTP facade. Cheap to clone; clones share options.
///
/// A facade bound to a `CancelToken` (see `with_cancel`) fails every call with
/// `FetchError::Cancelled` once the token fires, aborting in-flight transfers.
#[derive(Debug, Clone, Default)]
pub struct HttpFetch {
    opts: Arc<HttpOptions>,
    cancel: Option<CancelToken>,
}

impl HttpFetch {
    pub fn new(opts: HttpOptions) -> Self {
        Self {
            opts: Arc::new(opts),
            cancel: None,
        }
    }

    /// Same options, bound to `token`.
    pub fn with_cancel(&self, token: CancelToken) -> Self {
        Self {
            opts: Arc::clone(&self.opts),
            cancel: Some(token),
        }
    }

    pub fn options(&self) -> &HttpOptions {
        &self.opts
    }

    /// GET and decode a JSON body.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let resp = self.send_ok(Method::Get, url, None).await?;
        decode_json(&resp.body)
    }

    /// GET and return the body as UTF-8 text.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.send_ok(Method::Get, url, None).await?;
        String::from_utf8(resp.body)
            .map_err(|e| FetchError::Parse(format!("body is not UTF-8: {}", e)))
    }

    /// Like `fetch_json`, but a non-2xx error carries `message` as context.
    pub async fn fetch_json_with_error<T: DeserializeOwned>(
        &self,
        url: &str,
        message: &str,
    ) -> Result<T, FetchError> {
        match self.send_ok(Method::Get, url, None).await {
            Ok(resp) => decode_json(&resp.body),
            Err(FetchError::Http { status, body, .. }) => Err(FetchError::Http {
                status,
                body,
                context: Some(message.to_string()),
            }),
            Err(e) => Err(e),
        }
    }

    /// GET and report whether the status was 2xx. Only transport failure
    /// (or cancellation) is an error.
    pub async fn fetch_status(&self, url: &str) -> Result<bool, FetchError> {
        let resp = self.send(Method::Get, url, None).await?;
        Ok(is_success(resp.status))
    }

    /// Side-effecting call with an optional JSON body; the response body is discarded.
    pub async fn fetch_mutation<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<(), FetchError> {
        let payload = match body {
            Some(b) => Some(
                serde_json::to_vec(b)
                    .map_err(|e| FetchError::Parse(format!("encode request body: {}", e)))?,
            ),
            None => None,
        };
        self.send_ok(method, url, payload).await.map(|_| ())
    }

    async fn send_ok(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, FetchError> {
        let resp = self.send(method, url, body).await?;
        if !is_success(resp.status) {
            return Err(FetchError::Http {
                status: resp.status,
                body: error::error_body(&resp.body),
                context: None,
            });
        }
        Ok(resp)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, FetchError> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(FetchError::Cancelled);
        }
        tracing::debug!(method = method.as_str(), url, "http request");

        let task = tokio::task::spawn_blocking({
            let opts = Arc::clone(&self.opts);
            let url = url.to_string();
            let cancel = self.cancel.clone();
            move || perform(&opts, method, &url, body.as_deref(), cancel.as_ref())
        });

        let joined = match &self.cancel {
            None => task.await,
            // Dropping the handle detaches the transfer; libcurl stops it at the next progress tick.
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(FetchError::Cancelled),
                r = task => r,
            },
        };
        let result = joined
            .map_err(|e| FetchError::Transport(format!("request task failed: {}", e)))?;

        match &result {
            Ok(resp) => tracing::debug!(url, status = resp.status, bytes = resp.body.len(), "http response"),
            Err(e) => tracing::debug!(url, error = %e, "http request failed"),
        }
        result
    }
}

/// True for 2xx.
pub fn is_success(status: u32) -> bool {
    (200..300).contains(&status)
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))
}

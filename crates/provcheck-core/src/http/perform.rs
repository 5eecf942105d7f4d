//! Blocking libcurl transfer. Called on tokio's blocking pool by `HttpFetch`.

use std::time::Duration;

use super::{FetchError, HttpOptions, Method};
use crate::control::CancelToken;

/// Status and body of a completed transfer (any status).
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

/// Performs one request. Follows redirects. Aborts via the progress callback
/// once `cancel` fires.
pub(crate) fn perform(
    opts: &HttpOptions,
    method: Method,
    url: &str,
    body: Option<&[u8]>,
    cancel: Option<&CancelToken>,
) -> Result<RawResponse, FetchError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(FetchError::transport)?;
    easy.follow_location(true).map_err(FetchError::transport)?;
    easy.max_redirections(10).map_err(FetchError::transport)?;
    easy.connect_timeout(opts.connect_timeout)
        .map_err(FetchError::transport)?;
    easy.timeout(opts.request_timeout)
        .map_err(FetchError::transport)?;
    if let Some(ua) = &opts.user_agent {
        easy.useragent(ua).map_err(FetchError::transport)?;
    }

    match method {
        Method::Get => easy.get(true).map_err(FetchError::transport)?,
        Method::Post => easy.post(true).map_err(FetchError::transport)?,
        Method::Put | Method::Patch | Method::Delete => easy
            .custom_request(method.as_str())
            .map_err(FetchError::transport)?,
    }
    if let Some(b) = body {
        easy.post_fields_copy(b).map_err(FetchError::transport)?;
    } else if matches!(method, Method::Post | Method::Put | Method::Patch) {
        // Without this libcurl would try to read a request body from stdin.
        easy.post_fields_copy(&[]).map_err(FetchError::transport)?;
    }

    let mut list = curl::easy::List::new();
    list.append("Accept: application/json, text/plain;q=0.9, */*;q=0.5")
        .map_err(FetchError::transport)?;
    if body.is_some() {
        list.append("Content-Type: application/json")
            .map_err(FetchError::transport)?;
    }
    for (k, v) in &opts.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(FetchError::transport)?;
    }
    easy.http_headers(list).map_err(FetchError::transport)?;

    if cancel.is_some() {
        easy.progress(true).map_err(FetchError::transport)?;
    }

    let mut buf = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                buf.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(FetchError::transport)?;
        if let Some(token) = cancel {
            // Returning false aborts the transfer.
            transfer
                .progress_function(move |_, _, _, _| !token.is_cancelled())
                .map_err(FetchError::transport)?;
        }
        if let Err(e) = transfer.perform() {
            if e.is_aborted_by_callback() {
                return Err(FetchError::Cancelled);
            }
            return Err(FetchError::transport(e));
        }
    }

    let status = easy.response_code().map_err(FetchError::transport)?;
    Ok(RawResponse { status, body: buf })
}

/// Timeouts come from config; zero means "use the built-in default".
pub(crate) fn secs_or(secs: u64, fallback: Duration) -> Duration {
    if secs == 0 {
        fallback
    } else {
        Duration::from_secs(secs)
    }
}

//! Manifest lookup: `GET {path}?manifest=json` on the file server.
//!
//! 200 with a manifest body is `Present`, 404 is `Absent` (no manifest was
//! ever recorded, which is not an error), anything else is a typed failure.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ProvcheckConfig;
use crate::control::CancelToken;
use crate::error::VerifyError;
use crate::http::{FetchError, HttpFetch, HttpOptions};

/// Server-recorded provenance for one file.
///
/// Only `type`, `algorithm` and `hash` are guaranteed by the server; any other
/// field is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Resource path; filled from the request when the body omits it.
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub algorithm: String,
    #[serde(rename = "hash")]
    pub hex_digest: String,
    #[serde(default, alias = "producedAt", skip_serializing_if = "Option::is_none")]
    pub produced_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ManifestRecord {
    /// True when `algorithm` names SHA-256 (`sha256`, `SHA-256`, ...).
    pub fn is_sha256(&self) -> bool {
        let algo: String = self
            .algorithm
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        algo.eq_ignore_ascii_case("sha256")
    }
}

/// Result of a manifest lookup that got an answer from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestOutcome {
    Present(ManifestRecord),
    Absent,
}

impl ManifestOutcome {
    pub fn record(&self) -> Option<&ManifestRecord> {
        match self {
            ManifestOutcome::Present(r) => Some(r),
            ManifestOutcome::Absent => None,
        }
    }
}

/// Fetches manifests from one server. Issues exactly one request per lookup.
#[derive(Debug, Clone)]
pub struct ProvenanceClient {
    base: Url,
    http: HttpFetch,
}

impl ProvenanceClient {
    pub fn new(base_url: &str, http: HttpFetch) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base_url)?,
            http,
        })
    }

    pub fn from_config(cfg: &ProvcheckConfig) -> anyhow::Result<Self> {
        let http = HttpFetch::new(HttpOptions::from_config(cfg));
        Self::new(&cfg.server_url, http)
            .with_context(|| format!("invalid server_url {:?}", cfg.server_url))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn http(&self) -> &HttpFetch {
        &self.http
    }

    /// `{base}{path}?manifest=json`. A leading `/` is added to `path` if missing.
    pub fn manifest_url(&self, path: &str) -> Url {
        let mut url = self.resource_url(path);
        url.query_pairs_mut().append_pair("manifest", "json");
        url
    }

    /// `{base}{path}` without the manifest query. Query pairs on the base URL
    /// (e.g. an access token) are kept.
    pub fn resource_url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        url.set_path(&format!("{}/{}", prefix, path));
        url.set_fragment(None);
        url
    }

    pub async fn fetch_manifest(&self, path: &str) -> Result<ManifestOutcome, VerifyError> {
        self.fetch_with(&self.http, path).await
    }

    /// Same as `fetch_manifest`, aborting the request when `token` fires.
    pub async fn fetch_manifest_cancellable(
        &self,
        path: &str,
        token: &CancelToken,
    ) -> Result<ManifestOutcome, VerifyError> {
        self.fetch_with(&self.http.with_cancel(token.clone()), path)
            .await
    }

    /// Raw manifest body as text (for inspection; no classification beyond 2xx).
    pub async fn fetch_manifest_text(&self, path: &str) -> Result<String, VerifyError> {
        let url = self.manifest_url(path);
        Ok(self.http.fetch_text(url.as_str()).await?)
    }

    async fn fetch_with(&self, http: &HttpFetch, path: &str) -> Result<ManifestOutcome, VerifyError> {
        let url = self.manifest_url(path);
        match http.fetch_json::<ManifestRecord>(url.as_str()).await {
            Ok(mut record) => {
                if record.path.is_empty() {
                    record.path = path.to_string();
                }
                if !record.is_sha256() {
                    tracing::warn!(path, algorithm = %record.algorithm, "manifest uses a non-SHA-256 algorithm");
                }
                tracing::debug!(path, "manifest present");
                Ok(ManifestOutcome::Present(record))
            }
            Err(FetchError::Http { status: 404, .. }) => {
                tracing::debug!(path, "no manifest recorded");
                Ok(ManifestOutcome::Absent)
            }
            Err(e) => {
                tracing::debug!(path, error = %e, "manifest fetch failed");
                Err(e.into())
            }
        }
    }
}

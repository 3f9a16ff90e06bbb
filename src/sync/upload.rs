//! Upload collaborator.
//!
//! The engine only knows the [`Uploader`] trait. A batch is all-or-nothing:
//! the outcome applies to every item in it. Timeouts belong to the
//! uploader and surface as transient failures.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::SyncQueueItem;

/// Result of one upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The remote store applied the batch.
    Accepted,
    /// The remote copy changed concurrently; this is its current version.
    Conflict { remote: serde_json::Value },
    /// Worth retrying later (network, timeout, 5xx).
    Transient(String),
    /// The remote store will never accept this payload.
    Permanent(String),
}

impl UploadOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Pushes queued operations to the authoritative store.
pub trait Uploader: Send + Sync {
    /// Upload a batch of items, resolving to a single outcome.
    fn upload(&self, items: &[SyncQueueItem]) -> impl Future<Output = UploadOutcome> + Send;
}

/// Settings for [`HttpUploader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Base URL of the sync API.
    pub endpoint: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Bearer token sent with every request.
    pub token: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 10_000,
            token: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    items: Vec<UploadEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct UploadEntry<'a> {
    id: &'a str,
    entity_id: Option<&'a str>,
    operation: &'a str,
    payload: &'a serde_json::Value,
    created_at: i64,
}

#[derive(Debug, Deserialize)]
struct ConflictBody {
    remote: serde_json::Value,
}

/// JSON-over-HTTP uploader.
///
/// POSTs `{"items": [...]}` to `{endpoint}/sync/{entity_type}`.
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpUploader {
    /// Build an uploader from resolved settings.
    ///
    /// # Errors
    ///
    /// Returns `Config` when no endpoint is set.
    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| Error::Config("no upload endpoint configured".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url_for(&self, items: &[SyncQueueItem]) -> String {
        let entity_type = items.first().map_or("job", |i| i.entity_type.as_str());
        format!("{}/sync/{entity_type}", self.endpoint)
    }
}

impl Uploader for HttpUploader {
    async fn upload(&self, items: &[SyncQueueItem]) -> UploadOutcome {
        let request = UploadRequest {
            items: items
                .iter()
                .map(|item| UploadEntry {
                    id: &item.id,
                    entity_id: item.entity_id.as_deref(),
                    operation: item.operation.as_str(),
                    payload: &item.payload,
                    created_at: item.created_at,
                })
                .collect(),
        };

        let url = self.url_for(items);
        let mut builder = self.client.post(&url).timeout(self.timeout).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                let reason = format!("request timed out after {:?}", self.timeout);
                return UploadOutcome::Transient(reason);
            }
            Err(e) => return UploadOutcome::Transient(format!("request failed: {e}")),
        };

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!(url = %url, status, items = items.len(), "Upload response");

        classify_response(status, &body)
    }
}

/// Uploader for a device with no sync endpoint configured.
///
/// Lets queue maintenance run offline. Any attempt it is asked to make
/// fails transiently, so nothing is lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineUploader;

impl Uploader for OfflineUploader {
    async fn upload(&self, _items: &[SyncQueueItem]) -> UploadOutcome {
        UploadOutcome::Transient("offline: no upload endpoint configured".to_string())
    }
}

/// Map an HTTP status and body to an outcome.
///
/// 2xx accepts. 409 with a `{"remote": ...}` body is a conflict; any other
/// 409 body is treated as transient. 408, 429 and 5xx are transient. Every
/// other status is a permanent rejection.
#[must_use]
pub fn classify_response(status: u16, body: &str) -> UploadOutcome {
    match status {
        200..=299 => UploadOutcome::Accepted,
        409 => match serde_json::from_str::<ConflictBody>(body) {
            Ok(conflict) => UploadOutcome::Conflict {
                remote: conflict.remote,
            },
            Err(_) => UploadOutcome::Transient(format!(
                "HTTP 409 without remote version: {}",
                snippet(body)
            )),
        },
        408 | 429 | 500..=599 => {
            UploadOutcome::Transient(format!("HTTP {status}: {}", snippet(body)))
        }
        _ => UploadOutcome::Permanent(format!("HTTP {status}: {}", snippet(body))),
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty body)".to_string();
    }
    trimmed.chars().take(200).collect()
}

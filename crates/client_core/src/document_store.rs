//! Primary sink: one Firestore document per registration, written through a
//! local durable queue so that writes issued offline are delivered later.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use shared::domain::{RegistrationRecord, REGISTRATION_SOURCE};
use storage::Storage;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";
pub const DEFAULT_DATABASE_ID: &str = "(default)";
const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(pub String);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store is not configured: {0}")]
    Configuration(String),
    #[error("offline queue failure: {0:#}")]
    Queue(anyhow::Error),
    #[error("document store rejected the write ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Resolves once the write is accepted or rejected by the remote store.
    /// While the store is unreachable the future stays pending.
    async fn add(
        &self,
        collection: &str,
        record: &RegistrationRecord,
    ) -> Result<DocumentId, StoreError>;
}

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub project_id: String,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
    pub database_id: String,
    pub base_url: String,
    pub reconnect_interval: Duration,
    pub request_timeout: Duration,
}

impl FirestoreConfig {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            api_key: None,
            auth_domain: None,
            project_id: project_id.into(),
            storage_bucket: None,
            messaging_sender_id: None,
            app_id: None,
            database_id: DEFAULT_DATABASE_ID.into(),
            base_url: DEFAULT_FIRESTORE_BASE_URL.into(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub delivered: usize,
    pub rejected: usize,
}

enum CommitError {
    /// Offline, timed out, or a retryable server status. The write stays queued.
    Unavailable(String),
    Rejected { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorBody {
    error: FirestoreErrorDetail,
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Clone)]
pub struct FirestoreStore {
    http: Client,
    config: FirestoreConfig,
    commit_url: Url,
    queue: Storage,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig, queue: Storage) -> Result<Self, StoreError> {
        if config.project_id.trim().is_empty() {
            return Err(StoreError::Configuration("missing Firebase project id".into()));
        }
        if config.api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
            error!("Firebase API key is missing; document writes will likely be rejected");
        } else {
            info!(
                project_id = %config.project_id,
                auth_domain = ?config.auth_domain,
                app_id = ?config.app_id,
                "document store initialized"
            );
        }

        let commit_url = commit_url(&config)
            .map_err(|err| StoreError::Configuration(format!("invalid Firestore url: {err}")))?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| StoreError::Configuration(err.to_string()))?;
        Ok(Self {
            http,
            config,
            commit_url,
            queue,
        })
    }

    /// Delivers writes left in the queue by an earlier process.
    pub async fn replay_pending(&self) -> Result<ReplaySummary, StoreError> {
        let pending = self.queue.pending_writes().await.map_err(StoreError::Queue)?;
        if pending.is_empty() {
            return Ok(ReplaySummary::default());
        }
        info!(count = pending.len(), "document store: replaying queued writes");

        let mut summary = ReplaySummary::default();
        for write in pending {
            match self
                .deliver(&write.collection, &write.document_id, &write.payload)
                .await
            {
                Ok(_) => summary.delivered += 1,
                Err(StoreError::Rejected { status, message }) => {
                    warn!(
                        document_id = %write.document_id,
                        status,
                        %message,
                        "document store: queued write rejected on replay"
                    );
                    summary.rejected += 1;
                }
                Err(other) => return Err(other),
            }
        }
        Ok(summary)
    }

    async fn deliver(
        &self,
        collection: &str,
        document_id: &str,
        payload: &Value,
    ) -> Result<DocumentId, StoreError> {
        loop {
            match self.commit(collection, document_id, payload).await {
                Ok(()) => {
                    self.forget(document_id).await;
                    debug!(%document_id, "document store: write acknowledged");
                    return Ok(DocumentId(document_id.to_string()));
                }
                Err(CommitError::Rejected { status, message }) => {
                    self.forget(document_id).await;
                    return Err(StoreError::Rejected { status, message });
                }
                Err(CommitError::Unavailable(reason)) => {
                    warn!(
                        %document_id,
                        %reason,
                        retry_in_ms = self.config.reconnect_interval.as_millis() as u64,
                        "document store unreachable; write stays queued"
                    );
                    if let Err(err) = self
                        .queue
                        .record_failed_attempt(document_id, &reason)
                        .await
                    {
                        warn!(error = %err, "document store: failed to record delivery attempt");
                    }
                    tokio::time::sleep(self.config.reconnect_interval).await;
                }
            }
        }
    }

    async fn forget(&self, document_id: &str) {
        // A stale entry is replayed later and acknowledged as already existing.
        if let Err(err) = self.queue.remove_write(document_id).await {
            warn!(%document_id, error = %err, "document store: failed to dequeue write");
        }
    }

    async fn commit(
        &self,
        collection: &str,
        document_id: &str,
        payload: &Value,
    ) -> Result<(), CommitError> {
        let body = json!({
            "writes": [{
                "update": {
                    "name": self.document_name(collection, document_id),
                    "fields": payload,
                },
                "currentDocument": { "exists": false },
                "updateTransforms": [{
                    "fieldPath": "submittedAt",
                    "setToServerValue": "REQUEST_TIME",
                }],
            }],
        });

        let response = match self.http.post(self.commit_url.clone()).json(&body).send().await {
            Ok(response) => response,
            Err(err) => return Err(CommitError::Unavailable(err.to_string())),
        };
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<FirestoreErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(FirestoreErrorDetail {
                message: text,
                status: String::new(),
            });
        classify_failure(status, detail)
    }

    fn document_name(&self, collection: &str, document_id: &str) -> String {
        format!(
            "projects/{}/databases/{}/documents/{collection}/{document_id}",
            self.config.project_id, self.config.database_id
        )
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn add(
        &self,
        collection: &str,
        record: &RegistrationRecord,
    ) -> Result<DocumentId, StoreError> {
        let document_id = Uuid::new_v4().simple().to_string();
        let payload = encode_fields(record);
        self.queue
            .enqueue_write(collection, &document_id, &payload)
            .await
            .map_err(StoreError::Queue)?;
        self.deliver(collection, &document_id, &payload).await
    }
}

fn commit_url(config: &FirestoreConfig) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&config.base_url)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push("v1")
        .push("projects")
        .push(&config.project_id)
        .push("databases")
        .push(&config.database_id)
        .push("documents:commit");
    if let Some(key) = config.api_key.as_deref().filter(|key| !key.is_empty()) {
        url.query_pairs_mut().append_pair("key", key);
    }
    Ok(url)
}

fn classify_failure(status: StatusCode, detail: FirestoreErrorDetail) -> Result<(), CommitError> {
    // Duplicate delivery of a replayed write.
    if status == StatusCode::CONFLICT || detail.status == "ALREADY_EXISTS" {
        return Ok(());
    }
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return Err(CommitError::Unavailable(format!(
            "{status}: {}",
            detail.message
        )));
    }
    Err(CommitError::Rejected {
        status: status.as_u16(),
        message: detail.message,
    })
}

fn string(value: &str) -> Value {
    json!({ "stringValue": value })
}

/// Firestore typed-value encoding of a registration plus its source tag.
/// `submittedAt` is added server-side by the commit transform.
pub fn encode_fields(record: &RegistrationRecord) -> Value {
    let mut fields = Map::new();
    fields.insert("name".into(), string(&record.name));
    fields.insert("mobileNumber".into(), string(&record.mobile_number));
    fields.insert("email".into(), string(&record.email));
    fields.insert("apartment".into(), string(&record.apartment));
    fields.insert("locality".into(), string(&record.locality));
    fields.insert("pincode".into(), string(&record.pincode));
    fields.insert("age".into(), string(&record.age));
    fields.insert(
        "interests".into(),
        json!({
            "arrayValue": {
                "values": record
                    .interests
                    .iter()
                    .map(|interest| string(interest))
                    .collect::<Vec<_>>(),
            }
        }),
    );
    fields.insert("notes".into(), string(&record.notes));
    fields.insert("source".into(), string(REGISTRATION_SOURCE));
    Value::Object(fields)
}

#[cfg(test)]
#[path = "tests/document_store_tests.rs"]
mod tests;

//! Secondary sink: mirrors a registration into the review spreadsheet through
//! the server's register route.

use async_trait::async_trait;
use reqwest::Client;
use shared::{domain::RegistrationRecord, protocol::RegisterResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("spreadsheet request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("spreadsheet sink rejected the record ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[async_trait]
pub trait SpreadsheetSink: Send + Sync + 'static {
    /// One attempt, no retries.
    async fn append(&self, record: &RegistrationRecord) -> Result<(), SinkError>;
}

#[derive(Clone)]
pub struct RegisterApiSink {
    http: Client,
    server_url: String,
}

impl RegisterApiSink {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_http_client(Client::new(), server_url)
    }

    pub fn with_http_client(http: Client, server_url: impl Into<String>) -> Self {
        Self {
            http,
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SpreadsheetSink for RegisterApiSink {
    async fn append(&self, record: &RegistrationRecord) -> Result<(), SinkError> {
        let response = self
            .http
            .post(format!(
                "{}{}",
                self.server_url,
                shared::protocol::register_route()
            ))
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response
            .json::<RegisterResponse>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| status.to_string());
        Err(SinkError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
#[path = "tests/sinks_tests.rs"]
mod tests;

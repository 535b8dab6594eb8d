//! Appends registrations to a Google Sheet as a service account.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::domain::RegistrationRecord;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_RANGE: &str = "Sheet1!A:I";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECONDS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub client_email: Option<String>,
    /// PEM private key; literal `\n` sequences are accepted.
    pub private_key: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub range: String,
    pub token_uri: String,
    pub api_base: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            client_email: None,
            private_key: None,
            spreadsheet_id: None,
            range: DEFAULT_RANGE.into(),
            token_uri: DEFAULT_TOKEN_URI.into(),
            api_base: DEFAULT_API_BASE.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("missing Google Sheets credentials (client email or private key)")]
    MissingCredentials,
    #[error("missing Google Sheets spreadsheet id")]
    MissingSpreadsheetId,
    #[error("invalid service account private key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
    #[error("invalid Google Sheets endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("Google Sheets request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Google Sheets rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl SheetsError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SheetsError::MissingCredentials
                | SheetsError::MissingSpreadsheetId
                | SheetsError::InvalidKey(_)
        )
    }
}

/// Destination for one spreadsheet row per registration.
#[async_trait]
pub trait SpreadsheetAppender: Send + Sync {
    async fn append(&self, record: &RegistrationRecord) -> Result<(), SheetsError>;
}

/// Column order of the review sheet.
pub fn row_values(record: &RegistrationRecord, timestamp: DateTime<Utc>) -> Vec<String> {
    vec![
        record.name.clone(),
        record.mobile_number.clone(),
        record.email.clone(),
        record.apartment.clone(),
        record.locality.clone(),
        record.pincode.clone(),
        record.age.clone(),
        record.joined_interests(),
        record.notes.clone(),
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
    ]
}

pub fn unescape_private_key(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_TTL_SECONDS as u64
}

#[derive(Debug, Serialize)]
struct AppendRequest<'a> {
    values: [&'a [String]; 1],
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

struct Credentials<'a> {
    client_email: &'a str,
    private_key: &'a str,
    spreadsheet_id: &'a str,
}

pub struct SheetsClient {
    http: Client,
    config: SheetsConfig,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> Self {
        Self::with_http_client(Client::new(), config)
    }

    pub fn with_http_client(http: Client, config: SheetsConfig) -> Self {
        Self {
            http,
            config,
            token: Mutex::new(None),
        }
    }

    fn credentials(&self) -> Result<Credentials<'_>, SheetsError> {
        let (Some(client_email), Some(private_key)) = (
            present(&self.config.client_email),
            present(&self.config.private_key),
        ) else {
            return Err(SheetsError::MissingCredentials);
        };
        let spreadsheet_id =
            present(&self.config.spreadsheet_id).ok_or(SheetsError::MissingSpreadsheetId)?;
        Ok(Credentials {
            client_email,
            private_key,
            spreadsheet_id,
        })
    }

    async fn access_token(&self, credentials: &Credentials<'_>) -> Result<String, SheetsError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = sign_assertion(
            credentials.client_email,
            credentials.private_key,
            &self.config.token_uri,
            Utc::now(),
        )?;
        let response = self
            .http
            .post(&self.config.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let response = ensure_accepted(response).await?;
        let body: TokenResponse = response.json().await?;
        debug!(
            client_email = credentials.client_email,
            expires_in = body.expires_in,
            "sheets: obtained access token"
        );

        *cached = Some(CachedToken {
            access_token: body.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        });
        Ok(body.access_token)
    }

    fn append_url(&self, spreadsheet_id: &str) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.config.api_base)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push("v4")
            .push("spreadsheets")
            .push(spreadsheet_id)
            .push("values")
            .push(&format!("{}:append", self.config.range));
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        Ok(url)
    }
}

#[async_trait]
impl SpreadsheetAppender for SheetsClient {
    /// Single attempt. Configuration problems fail before any request is made.
    async fn append(&self, record: &RegistrationRecord) -> Result<(), SheetsError> {
        let credentials = self.credentials()?;
        let row = row_values(record, Utc::now());
        let url = self.append_url(credentials.spreadsheet_id)?;
        let token = self.access_token(&credentials).await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&AppendRequest {
                values: [row.as_slice()],
            })
            .send()
            .await?;
        ensure_accepted(response).await?;
        info!(
            spreadsheet_id = credentials.spreadsheet_id,
            range = %self.config.range,
            "sheets: appended registration row"
        );
        Ok(())
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn sign_assertion(
    client_email: &str,
    private_key: &str,
    token_uri: &str,
    now: DateTime<Utc>,
) -> Result<String, SheetsError> {
    let key = EncodingKey::from_rsa_pem(unescape_private_key(private_key).as_bytes())?;
    let claims = AssertionClaims {
        iss: client_email,
        scope: SHEETS_SCOPE,
        aud: token_uri,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_TTL_SECONDS,
    };
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}

async fn ensure_accepted(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GoogleErrorBody>(&text)
        .map(|body| body.error.message)
        .unwrap_or(text);
    Err(SheetsError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

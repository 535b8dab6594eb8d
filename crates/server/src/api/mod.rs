//! Register route logic, kept apart from axum so it can be driven directly.

use sheets_integration::{SheetsError, SpreadsheetAppender};
use shared::domain::RegistrationRecord;
use thiserror::Error;

/// Body of the 500 reply when the spreadsheet integration is not configured.
pub const CONFIGURATION_ERROR_MESSAGE: &str = "Server Configuration Error";

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("invalid registration payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Sheets(#[from] SheetsError),
}

impl RegisterError {
    /// Text returned to the caller in the `error` field.
    pub fn public_message(&self) -> String {
        match self {
            RegisterError::Sheets(err) if err.is_configuration() => {
                CONFIGURATION_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Parses the camelCase body and appends exactly one row.
pub async fn register(
    sheets: &dyn SpreadsheetAppender,
    body: &[u8],
) -> Result<RegistrationRecord, RegisterError> {
    let record: RegistrationRecord = serde_json::from_slice(body)?;
    sheets.append(&record).await?;
    Ok(record)
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;

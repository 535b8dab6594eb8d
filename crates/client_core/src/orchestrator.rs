//! Dual-write submission: the document store decides the verdict, the
//! spreadsheet copy is best effort.

use std::{sync::Arc, time::Duration};

use shared::domain::{RegistrationRecord, REGISTRATIONS_COLLECTION};
use tracing::{debug, error, info};

use crate::{
    document_store::DocumentStore,
    race::{race_with_timeout, Race},
    sinks::SpreadsheetSink,
};

/// How long a submission waits for the document store before reporting
/// optimistic success.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The document store acknowledged the write.
    Confirmed,
    /// The timeout elapsed first; the write is still in flight or queued.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success { delivery: Delivery },
    Failure { reason: String },
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success { .. })
    }
}

pub struct SubmissionOrchestrator {
    store: Arc<dyn DocumentStore>,
    spreadsheet: Arc<dyn SpreadsheetSink>,
    store_timeout: Duration,
}

impl SubmissionOrchestrator {
    pub fn new(store: Arc<dyn DocumentStore>, spreadsheet: Arc<dyn SpreadsheetSink>) -> Self {
        Self {
            store,
            spreadsheet,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Delivers one record to both sinks.
    ///
    /// The caller must have checked that at least one interest is selected.
    /// The spreadsheet append is started exactly once and never awaited. The
    /// document write is awaited for at most the store timeout and is never
    /// cancelled, so a timed-out write may still land (or fail) later without
    /// the caller hearing about it.
    pub async fn submit(&self, record: RegistrationRecord) -> Verdict {
        let record = Arc::new(record);
        self.dispatch_spreadsheet(Arc::clone(&record));

        let store = Arc::clone(&self.store);
        let write_record = Arc::clone(&record);
        let write = async move {
            let outcome = store.add(REGISTRATIONS_COLLECTION, &write_record).await;
            match &outcome {
                Ok(document_id) => {
                    debug!(document_id = %document_id.0, "document write settled")
                }
                Err(err) => debug!(error = %err, "document write settled with error"),
            }
            outcome
        };

        match race_with_timeout(write, self.store_timeout).await {
            Race::Completed(Ok(document_id)) => {
                info!(document_id = %document_id.0, "registration stored");
                Verdict::Success {
                    delivery: Delivery::Confirmed,
                }
            }
            Race::Completed(Err(err)) => {
                error!(error = %err, "registration write failed");
                Verdict::Failure {
                    reason: err.to_string(),
                }
            }
            Race::TimedOut => {
                info!(
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "document store still pending; reporting optimistic success"
                );
                Verdict::Success {
                    delivery: Delivery::Pending,
                }
            }
            Race::Aborted(join_error) => {
                error!(error = %join_error, "registration write task aborted");
                Verdict::Failure {
                    reason: join_error.to_string(),
                }
            }
        }
    }

    /// Detached, at-most-once, no retry. The result is only logged.
    fn dispatch_spreadsheet(&self, record: Arc<RegistrationRecord>) {
        let spreadsheet = Arc::clone(&self.spreadsheet);
        tokio::spawn(async move {
            match spreadsheet.append(&record).await {
                Ok(()) => info!("spreadsheet copy submitted"),
                Err(err) => error!(error = %err, "spreadsheet copy failed"),
            }
        });
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;

//! Scripted sinks shared by the orchestrator and form tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::domain::RegistrationRecord;
use tokio::sync::Mutex;

use crate::{
    document_store::{DocumentId, DocumentStore, StoreError},
    orchestrator::SubmissionOrchestrator,
    sinks::{SinkError, SpreadsheetSink},
};

pub(crate) fn scenario_record() -> RegistrationRecord {
    RegistrationRecord {
        name: "A".into(),
        mobile_number: "123".into(),
        email: "a@x.com".into(),
        locality: "L".into(),
        pincode: "1".into(),
        interests: vec!["yuva".into()],
        ..RegistrationRecord::default()
    }
}

#[derive(Clone, Copy)]
pub(crate) enum StoreOutcome {
    Accept,
    PermissionDenied,
}

pub(crate) struct ScriptedStore {
    delay: Duration,
    outcome: StoreOutcome,
    pub(crate) calls: AtomicUsize,
    pub(crate) settled: AtomicBool,
    pub(crate) collections: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub(crate) fn new(delay: Duration, outcome: StoreOutcome) -> Arc<Self> {
        Arc::new(Self {
            delay,
            outcome,
            calls: AtomicUsize::new(0),
            settled: AtomicBool::new(false),
            collections: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn has_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn add(
        &self,
        collection: &str,
        _record: &RegistrationRecord,
    ) -> Result<DocumentId, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.collections.lock().await.push(collection.to_string());
        tokio::time::sleep(self.delay).await;
        self.settled.store(true, Ordering::SeqCst);
        match self.outcome {
            StoreOutcome::Accept => Ok(DocumentId("doc-1".into())),
            StoreOutcome::PermissionDenied => Err(StoreError::Rejected {
                status: 403,
                message: "Missing or insufficient permissions.".into(),
            }),
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum SheetOutcome {
    Accept,
    Reject,
    Hang,
}

pub(crate) struct RecordingSheet {
    outcome: SheetOutcome,
    pub(crate) rows: Mutex<Vec<RegistrationRecord>>,
}

impl RecordingSheet {
    pub(crate) fn new(outcome: SheetOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            rows: Mutex::new(Vec::new()),
        })
    }

    pub(crate) async fn calls(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl SpreadsheetSink for RecordingSheet {
    async fn append(&self, record: &RegistrationRecord) -> Result<(), SinkError> {
        self.rows.lock().await.push(record.clone());
        match self.outcome {
            SheetOutcome::Accept => Ok(()),
            SheetOutcome::Reject => Err(SinkError::Rejected {
                status: 500,
                message: "Server Configuration Error".into(),
            }),
            SheetOutcome::Hang => std::future::pending().await,
        }
    }
}

pub(crate) fn orchestrator(
    store: &Arc<ScriptedStore>,
    sheet: &Arc<RecordingSheet>,
) -> SubmissionOrchestrator {
    SubmissionOrchestrator::new(store.clone(), sheet.clone())
}

/// Lets detached tasks that are ready to run make progress.
pub(crate) async fn settle_background() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

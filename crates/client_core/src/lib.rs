//! Client side of volunteer registration: the form state machine and the
//! dual-write submission to the document store and the review spreadsheet.

pub mod document_store;
pub mod form;
pub mod orchestrator;
pub mod race;
pub mod sinks;

pub use document_store::{
    DocumentId, DocumentStore, FirestoreConfig, FirestoreStore, ReplaySummary, StoreError,
};
pub use form::{Field, FormState, RegistrationForm, SubmitGate};
pub use orchestrator::{Delivery, SubmissionOrchestrator, Verdict, DEFAULT_STORE_TIMEOUT};
pub use sinks::{RegisterApiSink, SinkError, SpreadsheetSink};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

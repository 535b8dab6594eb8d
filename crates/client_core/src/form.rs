//! Registration form as an explicit state machine.
//!
//! ```text
//! Idle ──submit──▶ Submitting ──Success──▶ Success ──reset──▶ Idle
//!   ▲                  │
//!   └──── Failure ◀────┘ (fields kept, may resubmit)
//! ```

use shared::domain::{Interest, RegistrationRecord};
use tracing::debug;

use crate::orchestrator::{SubmissionOrchestrator, Verdict};

pub const INTERESTS_REQUIRED_MESSAGE: &str = "Please select at least one Area of Interest.";
pub const SUCCESS_MESSAGE: &str = "Thank you! Your information has been recorded.";
pub const FAILURE_MESSAGE: &str = "An error occurred. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Submitting,
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    MobileNumber,
    Email,
    Apartment,
    Locality,
    Pincode,
    Age,
    Notes,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "Full Name",
            Field::MobileNumber => "Mobile Number",
            Field::Email => "Email Address",
            Field::Apartment => "Apartment / Flat No",
            Field::Locality => "Locality",
            Field::Pincode => "Pincode",
            Field::Age => "Age",
            Field::Notes => "Additional Notes",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(
            self,
            Field::Name | Field::MobileNumber | Field::Email | Field::Locality | Field::Pincode
        )
    }

    const REQUIRED: [Field; 5] = [
        Field::Name,
        Field::MobileNumber,
        Field::Email,
        Field::Locality,
        Field::Pincode,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitGate {
    /// Validation passed; the form is now `Submitting` with this record.
    Ready(RegistrationRecord),
    MissingField(Field),
    NoInterests,
    /// A submission is already in flight.
    Busy,
}

#[derive(Debug, Clone)]
pub struct RegistrationForm {
    values: RegistrationRecord,
    state: FormState,
    message: Option<String>,
    interests_error: bool,
}

impl Default for RegistrationForm {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationForm {
    pub fn new() -> Self {
        Self {
            values: RegistrationRecord::default(),
            state: FormState::Idle,
            message: None,
            interests_error: false,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn interests_error(&self) -> bool {
        self.interests_error
    }

    pub fn values(&self) -> &RegistrationRecord {
        &self.values
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let slot = match field {
            Field::Name => &mut self.values.name,
            Field::MobileNumber => &mut self.values.mobile_number,
            Field::Email => &mut self.values.email,
            Field::Apartment => &mut self.values.apartment,
            Field::Locality => &mut self.values.locality,
            Field::Pincode => &mut self.values.pincode,
            Field::Age => &mut self.values.age,
            Field::Notes => &mut self.values.notes,
        };
        *slot = value;
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.values.name,
            Field::MobileNumber => &self.values.mobile_number,
            Field::Email => &self.values.email,
            Field::Apartment => &self.values.apartment,
            Field::Locality => &self.values.locality,
            Field::Pincode => &self.values.pincode,
            Field::Age => &self.values.age,
            Field::Notes => &self.values.notes,
        }
    }

    /// Checking appends in selection order; unchecking the last interest
    /// raises the interests error.
    pub fn toggle_interest(&mut self, interest: Interest, checked: bool) {
        let tag = interest.tag();
        let selected = self.values.interests.iter().any(|existing| existing == tag);
        if checked && !selected {
            self.values.interests.push(tag.to_string());
        } else if !checked {
            self.values.interests.retain(|existing| existing != tag);
        }
        self.interests_error = self.values.interests.is_empty();
    }

    pub fn is_selected(&self, interest: Interest) -> bool {
        self.values
            .interests
            .iter()
            .any(|existing| existing == interest.tag())
    }

    /// Validates and moves to `Submitting`. No sink is touched on rejection.
    pub fn begin_submit(&mut self) -> SubmitGate {
        if self.state == FormState::Submitting {
            return SubmitGate::Busy;
        }

        if let Some(field) = Field::REQUIRED
            .into_iter()
            .find(|field| self.field(*field).trim().is_empty())
        {
            self.message = Some(format!("Please fill in {}.", field.label()));
            return SubmitGate::MissingField(field);
        }

        if self.values.interests.is_empty() {
            self.interests_error = true;
            self.message = Some(INTERESTS_REQUIRED_MESSAGE.to_string());
            return SubmitGate::NoInterests;
        }

        self.state = FormState::Submitting;
        self.message = None;
        SubmitGate::Ready(self.values.clone())
    }

    /// Applies the orchestrator's verdict. Ignored unless a submission is in
    /// flight.
    pub fn finish_submit(&mut self, verdict: &Verdict) {
        if self.state != FormState::Submitting {
            debug!(state = ?self.state, "form: verdict arrived outside a submission");
            return;
        }
        match verdict {
            Verdict::Success { .. } => {
                self.values = RegistrationRecord::default();
                self.interests_error = false;
                self.message = Some(SUCCESS_MESSAGE.to_string());
                self.state = FormState::Success;
            }
            Verdict::Failure { .. } => {
                self.message = Some(FAILURE_MESSAGE.to_string());
                self.state = FormState::Failure;
            }
        }
    }

    /// "Submit another response".
    pub fn reset_after_success(&mut self) {
        if self.state == FormState::Success {
            self.state = FormState::Idle;
            self.message = None;
        }
    }

    pub async fn submit(&mut self, orchestrator: &SubmissionOrchestrator) -> FormState {
        if let SubmitGate::Ready(record) = self.begin_submit() {
            let verdict = orchestrator.submit(record).await;
            self.finish_submit(&verdict);
        }
        self.state
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;

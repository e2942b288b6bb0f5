use thiserror::Error;

use crate::domain::outcome::{FailureReason, ProvisioningOutcome};

/// Failure of a single call against the allocation API.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AllocationApiError {
    #[error("upstream rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl AllocationApiError {
    /// Rejection body text, if the upstream answered at all.
    pub fn rejection_body(&self) -> Option<&str> {
        match self {
            Self::Rejected { body, .. } => Some(body),
            Self::Transport(_) => None,
        }
    }
}

/// Every candidate, seeded or hinted, was rejected or errored.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("allocation exhausted after {attempts} attempt(s); last error: {}", describe(.last_error))]
pub struct AllocationExhausted {
    pub attempts: usize,
    pub rejections: usize,
    pub last_error: Option<AllocationApiError>,
}

fn describe(error: &Option<AllocationApiError>) -> String {
    error.as_ref().map(ToString::to_string).unwrap_or_else(|| "no candidates to try".to_owned())
}

impl AllocationExhausted {
    /// Exhaustion without a single upstream answer means the platform was
    /// never reached.
    pub fn failure_reason(&self) -> FailureReason {
        if self.attempts > 0 && self.rejections == 0 {
            FailureReason::TransportError
        } else {
            FailureReason::AllocationExhausted
        }
    }
}

impl From<AllocationExhausted> for ProvisioningOutcome {
    fn from(value: AllocationExhausted) -> Self {
        Self::Failed { reason: value.failure_reason(), detail: value.to_string() }
    }
}

use thiserror::Error;

use crate::infrastructure::StoreError;
use crate::lifecycle::Transition;
use crate::types::AppointmentStatus;

/// Every way a kernel operation can be rejected. Each variant is a distinct
/// outcome the caller is expected to tell apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Missing or malformed input. Not retryable.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("appointment '{0}' not found")]
    NotFound(String),

    /// The state machine has no edge for this transition from `from`.
    #[error("cannot {transition} an appointment that is {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        transition: Transition,
    },

    /// Ownership or role check failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Lost the race for a slot. A normal outcome: refresh and pick another.
    #[error("appointment '{appointment_id}' is already booked by another doctor")]
    Conflict { appointment_id: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl SlotError {
    /// Stable machine-readable code for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            SlotError::Validation(_) => "VALIDATION_ERROR",
            SlotError::NotFound(_) => "NOT_FOUND",
            SlotError::InvalidTransition { .. } => "INVALID_TRANSITION",
            SlotError::Unauthorized(_) => "UNAUTHORIZED",
            SlotError::Conflict { .. } => "CONFLICT",
            SlotError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

impl From<StoreError> for SlotError {
    fn from(err: StoreError) -> Self {
        SlotError::StoreUnavailable(err.to_string())
    }
}

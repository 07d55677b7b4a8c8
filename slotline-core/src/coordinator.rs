use crate::error::SlotError;
use crate::infrastructure::AppointmentStore;
use crate::lifecycle::{LifecycleEngine, Transition};
use crate::types::{Appointment, ClaimOutcome, ReleaseOutcome};

/// Executes claim, assign and release as a single conditional write each.
///
/// There is no read-then-decide step: the guard built by the lifecycle
/// engine is the only check, and the store evaluates it atomically. When
/// several callers race for one slot exactly one write applies; the others
/// get the row back and are classified as `Conflict`. Nothing is retried here.
pub struct SlotCoordinator;

impl SlotCoordinator {
    /// Claims (or, with `clinic_scope`, assigns) an open slot for `doctor_id`.
    pub fn try_claim(
        store: &dyn AppointmentStore,
        appointment_id: &str,
        doctor_id: &str,
        clinic_scope: Option<&str>,
    ) -> Result<ClaimOutcome, SlotError> {
        let transition = if clinic_scope.is_some() {
            Transition::Assign
        } else {
            Transition::Claim
        };

        let (applied, appointment) =
            Self::execute(store, transition, appointment_id, doctor_id, clinic_scope)?;

        tracing::debug!(
            appointment_id,
            doctor_id,
            %transition,
            applied,
            "Slot claim settled"
        );

        Ok(if applied {
            ClaimOutcome::Claimed { appointment }
        } else {
            ClaimOutcome::AlreadyHeld { appointment }
        })
    }

    /// Gives a booked slot back, provided `doctor_id` still holds it.
    pub fn try_release(
        store: &dyn AppointmentStore,
        appointment_id: &str,
        doctor_id: &str,
    ) -> Result<ReleaseOutcome, SlotError> {
        let (applied, appointment) =
            Self::execute(store, Transition::Release, appointment_id, doctor_id, None)?;

        tracing::debug!(appointment_id, doctor_id, applied, "Slot release settled");

        Ok(if applied {
            ReleaseOutcome::Released { appointment }
        } else {
            ReleaseOutcome::AlreadyOpen { appointment }
        })
    }

    fn execute(
        store: &dyn AppointmentStore,
        transition: Transition,
        appointment_id: &str,
        doctor_id: &str,
        clinic_scope: Option<&str>,
    ) -> Result<(bool, Appointment), SlotError> {
        let plan = LifecycleEngine::plan(transition, doctor_id, clinic_scope)?;

        let outcome = store
            .conditional_update(appointment_id, &plan.patch, &plan.guard)?
            .ok_or_else(|| SlotError::NotFound(appointment_id.to_string()))?;

        if outcome.applied {
            return Ok((true, outcome.row));
        }

        if let Err(err) =
            LifecycleEngine::classify_rejection(transition, &outcome.row, doctor_id, clinic_scope)
        {
            tracing::debug!(
                appointment_id,
                doctor_id,
                %transition,
                code = err.code(),
                "Slot write rejected"
            );
            return Err(err);
        }
        Ok((false, outcome.row))
    }
}

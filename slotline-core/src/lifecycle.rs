//! The appointment state machine.
//!
//! Pure decision logic: which edges exist, what a transition writes, what it
//! must find in the store for the write to apply, and how to read a rejected
//! write. Nothing here touches storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SlotError;
use crate::infrastructure::{NewRow, RowGuard, RowPatch};
use crate::types::{Appointment, AppointmentStatus, NewAppointment, Role};

/// Upper bound on free-text notes, in characters.
pub const MAX_NOTES_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Doctor takes an open slot
    Claim,
    /// Clinic places a doctor on an open slot
    Assign,
    /// Holding doctor gives the slot back
    Release,
}

impl Transition {
    /// Column index into the transition table
    pub fn to_index(self) -> usize {
        match self {
            Transition::Claim => 0,
            Transition::Assign => 1,
            Transition::Release => 2,
        }
    }

    /// The role allowed to request this transition.
    pub fn initiator(self) -> Role {
        match self {
            Transition::Claim | Transition::Release => Role::Doctor,
            Transition::Assign => Role::Clinic,
        }
    }

    /// The only state this transition leaves from.
    pub fn source(self) -> AppointmentStatus {
        match self {
            Transition::Claim | Transition::Assign => AppointmentStatus::Open,
            Transition::Release => AppointmentStatus::Booked,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Claim => write!(f, "claim"),
            Transition::Assign => write!(f, "assign"),
            Transition::Release => write!(f, "release"),
        }
    }
}

/// A transition expressed as one compare-and-set against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub transition: Transition,
    pub patch: RowPatch,
    pub guard: RowGuard,
}

pub struct LifecycleEngine;

impl LifecycleEngine {
    /// Rows: current status. Cols: transition. `None` = no edge.
    ///
    /// Order: Open(0), Booked(1) x Claim(0), Assign(1), Release(2)
    #[rustfmt::skip]
    const TABLE: [[Option<AppointmentStatus>; 3]; 2] = [
        //            Claim                           Assign                          Release
        /* Open   */ [Some(AppointmentStatus::Booked), Some(AppointmentStatus::Booked), None],
        /* Booked */ [None,                            None,                            Some(AppointmentStatus::Open)],
    ];

    /// O(1) lookup of the state `transition` leads to from `from`.
    pub fn next_status(
        from: AppointmentStatus,
        transition: Transition,
    ) -> Result<AppointmentStatus, SlotError> {
        Self::TABLE[from.to_index()][transition.to_index()]
            .ok_or(SlotError::InvalidTransition { from, transition })
    }

    /// Validates caller input for a new appointment and normalizes it into a
    /// row ready for insertion.
    pub fn validate_new(request: &NewAppointment) -> Result<NewRow, SlotError> {
        let clinic_id = request.clinic_id.trim();
        if clinic_id.is_empty() {
            return Err(SlotError::Validation("clinic_id is required".into()));
        }
        let patient_id = request.patient_id.trim();
        if patient_id.is_empty() {
            return Err(SlotError::Validation("patient_id is required".into()));
        }
        let date = Self::parse_date(&request.date)?;
        let notes = Self::normalize_notes(request.notes.as_deref())?;

        Ok(NewRow {
            clinic_id: clinic_id.to_string(),
            patient_id: patient_id.to_string(),
            date,
            notes,
        })
    }

    /// Accepts RFC 3339 timestamps only, so every stored date is an absolute
    /// instant.
    pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, SlotError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SlotError::Validation("date is required".into()));
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| {
                SlotError::Validation(format!(
                    "date '{}' is not a timezone-qualified RFC 3339 timestamp: {}",
                    raw, e
                ))
            })
    }

    /// Blank notes become `None`.
    pub fn normalize_notes(notes: Option<&str>) -> Result<Option<String>, SlotError> {
        match notes.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) if text.chars().count() > MAX_NOTES_LEN => Err(SlotError::Validation(
                format!("notes exceed {} characters", MAX_NOTES_LEN),
            )),
            Some(text) => Ok(Some(text.to_string())),
        }
    }

    /// Builds the single conditional write for `transition`.
    ///
    /// `doctor_id` is the doctor being placed on (claim/assign) or removed
    /// from (release) the slot. `clinic_scope` restricts the write to rows of
    /// one clinic and is required for `Assign`.
    pub fn plan(
        transition: Transition,
        doctor_id: &str,
        clinic_scope: Option<&str>,
    ) -> Result<TransitionPlan, SlotError> {
        if doctor_id.trim().is_empty() {
            return Err(SlotError::Validation("doctor_id is required".into()));
        }
        let from = transition.source();
        let to = Self::next_status(from, transition)?;

        let (patch, guard) = match transition {
            Transition::Claim => (
                RowPatch {
                    status: Some(to),
                    doctor_id: Some(Some(doctor_id.to_string())),
                    notes: None,
                },
                RowGuard {
                    status: Some(from),
                    ..RowGuard::default()
                },
            ),
            Transition::Assign => {
                let clinic_id = clinic_scope.ok_or_else(|| {
                    SlotError::Validation("assign requires the calling clinic".into())
                })?;
                (
                    RowPatch {
                        status: Some(to),
                        doctor_id: Some(Some(doctor_id.to_string())),
                        notes: None,
                    },
                    RowGuard {
                        status: Some(from),
                        clinic_id: Some(clinic_id.to_string()),
                        ..RowGuard::default()
                    },
                )
            }
            Transition::Release => (
                RowPatch {
                    status: Some(to),
                    doctor_id: Some(None),
                    notes: None,
                },
                RowGuard {
                    status: Some(from),
                    doctor_id: Some(doctor_id.to_string()),
                    ..RowGuard::default()
                },
            ),
        };

        Ok(TransitionPlan {
            transition,
            patch,
            guard,
        })
    }

    /// Reads the row returned by a conditional write that did not apply and
    /// decides what the caller sees. `Ok(())` means the row already reflects
    /// the transition for this caller and nothing needed to be written.
    ///
    /// Claim/assign on a slot this doctor already holds and release on a slot
    /// that is already open are idempotent successes, so a caller retrying
    /// after a timeout does not get a spurious failure.
    pub fn classify_rejection(
        transition: Transition,
        row: &Appointment,
        doctor_id: &str,
        clinic_scope: Option<&str>,
    ) -> Result<(), SlotError> {
        if let Some(clinic_id) = clinic_scope {
            if row.clinic_id != clinic_id {
                return Err(SlotError::Unauthorized(format!(
                    "appointment '{}' belongs to another clinic",
                    row.id
                )));
            }
        }

        if !row.is_consistent() {
            // A booked row with no holder (or the reverse) has no valid edge.
            return Err(SlotError::InvalidTransition {
                from: row.status,
                transition,
            });
        }

        match (transition, row.status) {
            (Transition::Claim | Transition::Assign, AppointmentStatus::Booked) => {
                if row.is_held_by(doctor_id) {
                    Ok(())
                } else {
                    Err(SlotError::Conflict {
                        appointment_id: row.id.clone(),
                    })
                }
            }
            (Transition::Release, AppointmentStatus::Open) => Ok(()),
            (Transition::Release, AppointmentStatus::Booked) => Err(SlotError::Unauthorized(
                format!("appointment '{}' is booked by another doctor", row.id),
            )),
            // The row is in the source state yet the write missed: it moved
            // between the compare and our read-back.
            (Transition::Claim | Transition::Assign, AppointmentStatus::Open) => {
                Err(SlotError::Conflict {
                    appointment_id: row.id.clone(),
                })
            }
        }
    }
}

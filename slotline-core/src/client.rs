//! High-level client that wraps the lifecycle kernel + pluggable storage.
//! The HTTP server delegates every operation to this.
//!
//! Every call takes the caller's resolved `Identity`; the client holds no
//! per-caller state and no cached appointment status, so one instance can
//! be shared across threads.

use std::sync::Arc;

use crate::coordinator::SlotCoordinator;
use crate::error::SlotError;
use crate::infrastructure::{AppointmentFilter, AppointmentStore, Directory, RowGuard, RowPatch};
use crate::infrastructure_in_memory::{InMemoryAppointmentStore, InMemoryDirectory};
use crate::lifecycle::{LifecycleEngine, Transition};
use crate::network::{partition_doctors, DoctorNetwork};
use crate::types::*;

/// Appointment counts by status, for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SlotStats {
    pub open: usize,
    pub booked: usize,
}

/// The main entry point for the kernel. Role-gates each operation and routes
/// state changes through the lifecycle engine and slot coordinator.
pub struct SlotClient {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn Directory>,
}

impl SlotClient {
    /// Create a new SlotClient with empty in-memory storage.
    pub fn new() -> Self {
        Self::with_backends(
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(InMemoryDirectory::new()),
        )
    }

    /// Create a new SlotClient backed by SQLite at the given path. The same
    /// database holds appointments and the directory.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(path: &str) -> Result<Self, SlotError> {
        let store = crate::infrastructure_sqlite::SqliteStore::open(path).map_err(|e| {
            SlotError::StoreUnavailable(format!(
                "failed to open SQLite database at '{}': {}",
                path, e
            ))
        })?;
        let store = Arc::new(store);
        Ok(Self::with_backends(store.clone(), store))
    }

    pub fn with_backends(store: Arc<dyn AppointmentStore>, directory: Arc<dyn Directory>) -> Self {
        Self { store, directory }
    }

    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    // ─── Identity ───────────────────────────────────────────────────────────

    /// Resolve a login name into a caller identity.
    pub fn login(&self, token: &str) -> Result<Identity, SlotError> {
        if token.trim().is_empty() {
            return Err(SlotError::Validation("name is required".into()));
        }
        self.directory.resolve_identity(token)?.ok_or_else(|| {
            SlotError::Unauthorized(format!("no doctor or clinic named '{}'", token.trim()))
        })
    }

    // ─── Clinic operations ──────────────────────────────────────────────────

    /// Publish a new open slot for one of the calling clinic's patients.
    pub fn create(
        &self,
        caller: &Identity,
        request: &NewAppointment,
    ) -> Result<Appointment, SlotError> {
        let clinic_id = caller.require(Role::Clinic)?;
        let row = LifecycleEngine::validate_new(request)?;

        if row.clinic_id != clinic_id {
            return Err(SlotError::Unauthorized(format!(
                "clinic '{}' cannot create appointments for clinic '{}'",
                clinic_id, row.clinic_id
            )));
        }
        match self.directory.patient(&row.patient_id)? {
            Some(patient) if patient.clinic_id == clinic_id => {}
            Some(_) => {
                return Err(SlotError::Validation(format!(
                    "patient '{}' is not registered with clinic '{}'",
                    row.patient_id, clinic_id
                )));
            }
            None => {
                return Err(SlotError::Validation(format!(
                    "unknown patient '{}'",
                    row.patient_id
                )));
            }
        }

        let appointment = self.store.insert(row)?;
        tracing::info!(
            appointment_id = %appointment.id,
            clinic_id = %appointment.clinic_id,
            date = %appointment.date,
            "Appointment created"
        );
        Ok(appointment)
    }

    /// Place `doctor_id` on one of the calling clinic's open slots.
    pub fn assign(
        &self,
        caller: &Identity,
        appointment_id: &str,
        doctor_id: &str,
    ) -> Result<ClaimOutcome, SlotError> {
        let clinic_id = caller.require(Transition::Assign.initiator())?;
        if doctor_id.trim().is_empty() {
            return Err(SlotError::Validation("doctor_id is required".into()));
        }
        if self.directory.doctor(doctor_id)?.is_none() {
            return Err(SlotError::Validation(format!("unknown doctor '{}'", doctor_id)));
        }

        let outcome =
            SlotCoordinator::try_claim(self.store.as_ref(), appointment_id, doctor_id, Some(clinic_id))?;
        tracing::info!(
            appointment_id,
            doctor_id,
            clinic_id,
            outcome = outcome.as_str(),
            "Doctor assigned"
        );
        Ok(outcome)
    }

    /// All of the calling clinic's appointments, by date.
    pub fn list_by_clinic(&self, caller: &Identity) -> Result<Vec<Appointment>, SlotError> {
        let clinic_id = caller.require(Role::Clinic)?;
        Ok(self.store.list(&AppointmentFilter::by_clinic(clinic_id))?)
    }

    /// Replace the notes on one of the calling clinic's appointments. Notes
    /// never affect status, so this is allowed in either state.
    pub fn update_notes(
        &self,
        caller: &Identity,
        appointment_id: &str,
        notes: Option<&str>,
    ) -> Result<Appointment, SlotError> {
        let clinic_id = caller.require(Role::Clinic)?;
        let notes = LifecycleEngine::normalize_notes(notes)?;

        let patch = RowPatch {
            notes: Some(notes),
            ..RowPatch::default()
        };
        let guard = RowGuard {
            clinic_id: Some(clinic_id.to_string()),
            ..RowGuard::default()
        };

        let outcome = self
            .store
            .conditional_update(appointment_id, &patch, &guard)?
            .ok_or_else(|| SlotError::NotFound(appointment_id.to_string()))?;
        if !outcome.applied {
            return Err(SlotError::Unauthorized(format!(
                "appointment '{}' belongs to another clinic",
                appointment_id
            )));
        }
        Ok(outcome.row)
    }

    /// In-network / out-of-network split of all doctors for the calling
    /// clinic, rebuilt from current bookings.
    pub fn doctor_network(&self, caller: &Identity) -> Result<DoctorNetwork, SlotError> {
        let clinic_id = caller.require(Role::Clinic)?;
        let booked = self.store.list(&AppointmentFilter {
            clinic_id: Some(clinic_id.to_string()),
            status: Some(AppointmentStatus::Booked),
            ..AppointmentFilter::default()
        })?;
        Ok(partition_doctors(clinic_id, self.directory.doctors()?, &booked))
    }

    /// The calling clinic's patients, by name.
    pub fn patients(&self, caller: &Identity) -> Result<Vec<Patient>, SlotError> {
        let clinic_id = caller.require(Role::Clinic)?;
        Ok(self.directory.patients_for_clinic(clinic_id)?)
    }

    /// Register a patient with the calling clinic.
    pub fn add_patient(&self, caller: &Identity, name: &str) -> Result<Patient, SlotError> {
        let clinic_id = caller.require(Role::Clinic)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SlotError::Validation("patient name is required".into()));
        }
        if self.directory.clinic(clinic_id)?.is_none() {
            return Err(SlotError::Unauthorized(format!("unknown clinic '{}'", clinic_id)));
        }

        let patient = Patient {
            id: nanoid::nanoid!(),
            name: name.to_string(),
            clinic_id: clinic_id.to_string(),
        };
        self.directory.add_patient(patient.clone())?;
        tracing::info!(patient_id = %patient.id, clinic_id, "Patient registered");
        Ok(patient)
    }

    // ─── Doctor operations ──────────────────────────────────────────────────

    /// Take an open slot. Retrying a claim that already landed is a no-op.
    pub fn claim(
        &self,
        caller: &Identity,
        appointment_id: &str,
    ) -> Result<ClaimOutcome, SlotError> {
        let doctor_id = caller.require(Transition::Claim.initiator())?;
        let outcome = SlotCoordinator::try_claim(self.store.as_ref(), appointment_id, doctor_id, None)?;
        tracing::info!(appointment_id, doctor_id, outcome = outcome.as_str(), "Appointment claimed");
        Ok(outcome)
    }

    /// Give back a slot the caller holds. Releasing an open slot is a no-op.
    pub fn release(
        &self,
        caller: &Identity,
        appointment_id: &str,
    ) -> Result<ReleaseOutcome, SlotError> {
        let doctor_id = caller.require(Transition::Release.initiator())?;
        let outcome = SlotCoordinator::try_release(self.store.as_ref(), appointment_id, doctor_id)?;
        tracing::info!(appointment_id, doctor_id, outcome = outcome.as_str(), "Appointment released");
        Ok(outcome)
    }

    /// Appointments the calling doctor currently holds, by date.
    pub fn list_by_doctor(&self, caller: &Identity) -> Result<Vec<Appointment>, SlotError> {
        let doctor_id = caller.require(Role::Doctor)?;
        Ok(self.store.list(&AppointmentFilter::by_doctor(doctor_id))?)
    }

    /// Every open slot across clinics, by date.
    pub fn list_open(&self, caller: &Identity) -> Result<Vec<Appointment>, SlotError> {
        caller.require(Role::Doctor)?;
        Ok(self.store.list(&AppointmentFilter::open())?)
    }

    // ─── Shared reads ───────────────────────────────────────────────────────

    pub fn get(&self, appointment_id: &str) -> Result<Appointment, SlotError> {
        self.store
            .get(appointment_id)?
            .ok_or_else(|| SlotError::NotFound(appointment_id.to_string()))
    }

    pub fn doctors(&self) -> Result<Vec<Doctor>, SlotError> {
        Ok(self.directory.doctors()?)
    }

    pub fn stats(&self) -> Result<SlotStats, SlotError> {
        let all = self.store.list(&AppointmentFilter::default())?;
        let booked = all
            .iter()
            .filter(|a| a.status == AppointmentStatus::Booked)
            .count();
        Ok(SlotStats {
            open: all.len() - booked,
            booked,
        })
    }
}

impl Default for SlotClient {
    fn default() -> Self {
        Self::new()
    }
}

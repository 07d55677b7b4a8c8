use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{Appointment, AppointmentStatus, Clinic, Doctor, Identity, Patient};

/// Failures raised by storage backends. Missing rows are reported as `None`,
/// never as an error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Fields of a freshly created appointment. New rows always start `open`
/// with no doctor.
#[derive(Debug, Clone)]
pub struct NewRow {
    pub clinic_id: String,
    pub patient_id: String,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Columns to write. `None` leaves a column untouched; `Some(None)` clears a
/// nullable column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowPatch {
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

impl RowPatch {
    pub fn apply_to(&self, row: &mut Appointment) {
        if let Some(status) = self.status {
            row.status = status;
        }
        if let Some(doctor_id) = &self.doctor_id {
            row.doctor_id = doctor_id.clone();
        }
        if let Some(notes) = &self.notes {
            row.notes = notes.clone();
        }
    }
}

/// Compare part of a compare-and-set. Every `Some` field must equal the
/// stored value at write time for the patch to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowGuard {
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<String>,
    pub clinic_id: Option<String>,
}

impl RowGuard {
    pub fn matches(&self, row: &Appointment) -> bool {
        if let Some(status) = self.status {
            if row.status != status {
                return false;
            }
        }
        if let Some(doctor_id) = &self.doctor_id {
            if row.doctor_id.as_deref() != Some(doctor_id.as_str()) {
                return false;
            }
        }
        if let Some(clinic_id) = &self.clinic_id {
            if &row.clinic_id != clinic_id {
                return false;
            }
        }
        true
    }
}

/// What a conditional update saw: whether the write landed, and the row as
/// it stands afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub applied: bool,
    pub row: Appointment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub clinic_id: Option<String>,
    pub doctor_id: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn open() -> Self {
        Self {
            status: Some(AppointmentStatus::Open),
            ..Self::default()
        }
    }

    pub fn by_clinic(clinic_id: impl Into<String>) -> Self {
        Self {
            clinic_id: Some(clinic_id.into()),
            ..Self::default()
        }
    }

    pub fn by_doctor(doctor_id: impl Into<String>) -> Self {
        Self {
            doctor_id: Some(doctor_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, row: &Appointment) -> bool {
        self.clinic_id.as_ref().is_none_or(|c| &row.clinic_id == c)
            && self
                .doctor_id
                .as_ref()
                .is_none_or(|d| row.doctor_id.as_ref() == Some(d))
            && self.status.is_none_or(|s| row.status == s)
    }
}

/// Defines the contract for appointment storage backends.
///
/// Implementations must make `conditional_update` atomic with respect to
/// every other writer of the same row: the guard is evaluated and the patch
/// applied as one step.
pub trait AppointmentStore: Send + Sync {
    /// Insert a new `open` appointment and return it with its generated id.
    fn insert(&self, row: NewRow) -> Result<Appointment, StoreError>;

    /// Apply `patch` only if `guard` matches the stored row. Returns `None`
    /// when no row has this id.
    fn conditional_update(
        &self,
        id: &str,
        patch: &RowPatch,
        guard: &RowGuard,
    ) -> Result<Option<UpdateOutcome>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<Appointment>, StoreError>;

    /// Rows matching `filter`, ordered by `date` ascending.
    fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;
}

/// Reference entities owned by the surrounding system. The lifecycle core
/// only reads identifiers from here.
pub trait Directory: Send + Sync {
    fn add_clinic(&self, clinic: Clinic) -> Result<(), StoreError>;
    fn add_doctor(&self, doctor: Doctor) -> Result<(), StoreError>;
    fn add_patient(&self, patient: Patient) -> Result<(), StoreError>;

    fn clinic(&self, id: &str) -> Result<Option<Clinic>, StoreError>;
    fn doctor(&self, id: &str) -> Result<Option<Doctor>, StoreError>;
    fn patient(&self, id: &str) -> Result<Option<Patient>, StoreError>;

    /// All clinics, ordered by name.
    fn clinics(&self) -> Result<Vec<Clinic>, StoreError>;
    /// All doctors, ordered by name.
    fn doctors(&self) -> Result<Vec<Doctor>, StoreError>;
    /// Patients of one clinic, ordered by name.
    fn patients_for_clinic(&self, clinic_id: &str) -> Result<Vec<Patient>, StoreError>;

    /// Map a login token (a display name, case-insensitive) to a caller.
    /// Doctors are matched before clinics.
    fn resolve_identity(&self, token: &str) -> Result<Option<Identity>, StoreError> {
        let wanted = token.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }
        if let Some(doctor) = self
            .doctors()?
            .into_iter()
            .find(|d| d.name.to_lowercase() == wanted)
        {
            return Ok(Some(Identity::doctor(doctor.id)));
        }
        Ok(self
            .clinics()?
            .into_iter()
            .find(|c| c.name.to_lowercase() == wanted)
            .map(|c| Identity::clinic(c.id)))
    }
}

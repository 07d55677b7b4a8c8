use std::collections::HashMap;
use std::sync::RwLock;

use crate::infrastructure::{
    AppointmentFilter, AppointmentStore, Directory, NewRow, RowGuard, RowPatch, StoreError,
    UpdateOutcome,
};
use crate::types::{Appointment, AppointmentStatus, Clinic, Doctor, Patient};

/// Appointment rows in a map behind a single `RwLock`. Conditional updates
/// take the write lock, so compare and set happen as one step.
pub struct InMemoryAppointmentStore {
    // Map of Appointment ID -> Appointment
    rows: RwLock<HashMap<String, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryAppointmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentStore for InMemoryAppointmentStore {
    fn insert(&self, row: NewRow) -> Result<Appointment, StoreError> {
        let appointment = Appointment {
            id: nanoid::nanoid!(),
            clinic_id: row.clinic_id,
            patient_id: row.patient_id,
            doctor_id: None,
            date: row.date,
            notes: row.notes,
            status: AppointmentStatus::Open,
        };

        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        rows.insert(appointment.id.clone(), appointment.clone());
        Ok(appointment)
    }

    fn conditional_update(
        &self,
        id: &str,
        patch: &RowPatch,
        guard: &RowGuard,
    ) -> Result<Option<UpdateOutcome>, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        let Some(row) = rows.get_mut(id) else {
            return Ok(None);
        };

        let applied = guard.matches(row);
        if applied {
            patch.apply_to(row);
        }
        Ok(Some(UpdateOutcome {
            applied,
            row: row.clone(),
        }))
    }

    fn get(&self, id: &str) -> Result<Option<Appointment>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(id).cloned())
    }

    fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        let mut matching: Vec<Appointment> =
            rows.values().filter(|a| filter.matches(a)).cloned().collect();
        matching.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(matching)
    }
}

/// Directory entries held in process memory.
#[derive(Default)]
pub struct InMemoryDirectory {
    clinics: RwLock<HashMap<String, Clinic>>,
    doctors: RwLock<HashMap<String, Doctor>>,
    patients: RwLock<HashMap<String, Patient>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for InMemoryDirectory {
    fn add_clinic(&self, clinic: Clinic) -> Result<(), StoreError> {
        let mut clinics = self.clinics.write().map_err(|_| StoreError::Poisoned)?;
        clinics.insert(clinic.id.clone(), clinic);
        Ok(())
    }

    fn add_doctor(&self, doctor: Doctor) -> Result<(), StoreError> {
        let mut doctors = self.doctors.write().map_err(|_| StoreError::Poisoned)?;
        doctors.insert(doctor.id.clone(), doctor);
        Ok(())
    }

    fn add_patient(&self, patient: Patient) -> Result<(), StoreError> {
        let mut patients = self.patients.write().map_err(|_| StoreError::Poisoned)?;
        patients.insert(patient.id.clone(), patient);
        Ok(())
    }

    fn clinic(&self, id: &str) -> Result<Option<Clinic>, StoreError> {
        let clinics = self.clinics.read().map_err(|_| StoreError::Poisoned)?;
        Ok(clinics.get(id).cloned())
    }

    fn doctor(&self, id: &str) -> Result<Option<Doctor>, StoreError> {
        let doctors = self.doctors.read().map_err(|_| StoreError::Poisoned)?;
        Ok(doctors.get(id).cloned())
    }

    fn patient(&self, id: &str) -> Result<Option<Patient>, StoreError> {
        let patients = self.patients.read().map_err(|_| StoreError::Poisoned)?;
        Ok(patients.get(id).cloned())
    }

    fn clinics(&self) -> Result<Vec<Clinic>, StoreError> {
        let clinics = self.clinics.read().map_err(|_| StoreError::Poisoned)?;
        let mut all: Vec<Clinic> = clinics.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    fn doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let doctors = self.doctors.read().map_err(|_| StoreError::Poisoned)?;
        let mut all: Vec<Doctor> = doctors.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    fn patients_for_clinic(&self, clinic_id: &str) -> Result<Vec<Patient>, StoreError> {
        let patients = self.patients.read().map_err(|_| StoreError::Poisoned)?;
        let mut roster: Vec<Patient> = patients
            .values()
            .filter(|p| p.clinic_id == clinic_id)
            .cloned()
            .collect();
        roster.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(roster)
    }
}

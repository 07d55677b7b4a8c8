//! Directory bootstrap data: clinics, doctors and patients loaded at startup.

use serde::{Deserialize, Serialize};

use crate::error::SlotError;
use crate::infrastructure::Directory;
use crate::types::{Clinic, Doctor, Patient};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub clinics: Vec<Clinic>,
    #[serde(default)]
    pub doctors: Vec<Doctor>,
    #[serde(default)]
    pub patients: Vec<Patient>,
}

impl DirectorySeed {
    /// The sample practice used for local testing and demos.
    pub fn demo() -> Self {
        let clinic = |id: &str, name: &str| Clinic {
            id: id.into(),
            name: name.into(),
        };
        let doctor = |id: &str, name: &str, specialty: &str| Doctor {
            id: id.into(),
            name: name.into(),
            specialty: Some(specialty.into()),
        };
        let patient = |id: &str, name: &str, clinic_id: &str| Patient {
            id: id.into(),
            name: name.into(),
            clinic_id: clinic_id.into(),
        };

        Self {
            clinics: vec![
                clinic("clinic-smile", "Smile Dental Care"),
                clinic("clinic-bright", "Bright Smiles Clinic"),
                clinic("clinic-healthy", "Healthy Teeth Center"),
            ],
            doctors: vec![
                doctor("doctor-smith", "Dr. Alice Smith", "Orthodontics"),
                doctor("doctor-doe", "Dr. John Doe", "General Dentistry"),
                doctor("doctor-lee", "Dr. Sarah Lee", "Periodontics"),
            ],
            patients: vec![
                patient("patient-ada", "Ada Lovelace", "clinic-smile"),
                patient("patient-alan", "Alan Turing", "clinic-smile"),
                patient("patient-grace", "Grace Hopper", "clinic-bright"),
            ],
        }
    }

    /// Writes every entry into `directory`. Patients must name a clinic
    /// that is part of this seed or already in the directory.
    pub fn apply(&self, directory: &dyn Directory) -> Result<(), SlotError> {
        for clinic in &self.clinics {
            directory.add_clinic(clinic.clone())?;
        }
        for doctor in &self.doctors {
            directory.add_doctor(doctor.clone())?;
        }
        for patient in &self.patients {
            if directory.clinic(&patient.clinic_id)?.is_none() {
                return Err(SlotError::Validation(format!(
                    "patient '{}' references unknown clinic '{}'",
                    patient.id, patient.clinic_id
                )));
            }
            directory.add_patient(patient.clone())?;
        }
        Ok(())
    }
}

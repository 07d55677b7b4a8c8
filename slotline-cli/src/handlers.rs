use serde::{Deserialize, Serialize};

use slotline_core::client::SlotStats;
use slotline_core::types::{Identity, NewAppointment};

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub name: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }
}

/// Body of `POST /appointments`. The clinic comes from the caller identity
/// unless given explicitly.
#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    #[serde(default)]
    pub clinic_id: Option<String>,
    pub patient_id: String,
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateAppointmentRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.patient_id.trim().is_empty() {
            return Err("patient_id is required".to_string());
        }
        if self.date.trim().is_empty() {
            return Err("date is required".to_string());
        }
        Ok(())
    }

    pub fn into_new_appointment(self, caller: &Identity) -> NewAppointment {
        NewAppointment {
            clinic_id: self.clinic_id.unwrap_or_else(|| caller.id.clone()),
            patient_id: self.patient_id,
            date: self.date,
            notes: self.notes,
        }
    }
}

#[derive(Deserialize)]
pub struct AssignDoctorRequest {
    pub doctor_id: String,
}

impl AssignDoctorRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.doctor_id.trim().is_empty() {
            return Err("doctor_id is required".to_string());
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct UpdateNotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct AddPatientRequest {
    pub name: String,
}

impl AddPatientRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            code: None,
            error: None,
        }
    }

    pub fn err(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            code: Some(code.into()),
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub role: String,
    pub id: String,
    /// Value to send back in the identity header
    pub identity: String,
}

impl From<Identity> for LoginResponse {
    fn from(identity: Identity) -> Self {
        Self {
            role: identity.role.to_string(),
            id: identity.id.clone(),
            identity: identity.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub appointments: SlotStats,
    pub version: String,
}

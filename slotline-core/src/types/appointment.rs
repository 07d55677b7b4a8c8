use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Appointment states. The set is closed: an appointment is either waiting
/// for a doctor or held by exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    /// Unclaimed, `doctor_id` is empty
    Open,
    /// Held by the doctor in `doctor_id`
    Booked,
}

impl AppointmentStatus {
    /// Row index into the lifecycle transition table
    pub fn to_index(self) -> usize {
        match self {
            AppointmentStatus::Open => 0,
            AppointmentStatus::Booked => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Open => "open",
            AppointmentStatus::Booked => "booked",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown appointment status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(AppointmentStatus::Open),
            "booked" => Ok(AppointmentStatus::Booked),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    /// Owning clinic, fixed at creation
    pub clinic_id: String,
    /// Fixed at creation
    pub patient_id: String,
    /// Set iff `status` is `Booked`
    pub doctor_id: Option<String>,
    /// Scheduled time, fixed at creation
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// `booked` iff a doctor is set.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            AppointmentStatus::Open => self.doctor_id.is_none(),
            AppointmentStatus::Booked => self.doctor_id.is_some(),
        }
    }

    pub fn is_held_by(&self, doctor_id: &str) -> bool {
        self.status == AppointmentStatus::Booked && self.doctor_id.as_deref() == Some(doctor_id)
    }
}

/// Caller input for creating an appointment. `date` must carry an explicit
/// UTC offset (RFC 3339); naive local times are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAppointment {
    pub clinic_id: String,
    pub patient_id: String,
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Result of a successful claim or assign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// This call moved the slot from open to booked
    Claimed { appointment: Appointment },
    /// The slot was already booked by the same doctor; nothing was written
    AlreadyHeld { appointment: Appointment },
}

impl ClaimOutcome {
    /// Matches the serialized `outcome` tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimOutcome::Claimed { .. } => "claimed",
            ClaimOutcome::AlreadyHeld { .. } => "already_held",
        }
    }

    pub fn appointment(&self) -> &Appointment {
        match self {
            ClaimOutcome::Claimed { appointment } | ClaimOutcome::AlreadyHeld { appointment } => {
                appointment
            }
        }
    }

    pub fn into_appointment(self) -> Appointment {
        match self {
            ClaimOutcome::Claimed { appointment } | ClaimOutcome::AlreadyHeld { appointment } => {
                appointment
            }
        }
    }
}

/// Result of a successful release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// This call moved the slot from booked back to open
    Released { appointment: Appointment },
    /// The slot was already open; nothing was written
    AlreadyOpen { appointment: Appointment },
}

impl ReleaseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseOutcome::Released { .. } => "released",
            ReleaseOutcome::AlreadyOpen { .. } => "already_open",
        }
    }

    pub fn appointment(&self) -> &Appointment {
        match self {
            ReleaseOutcome::Released { appointment }
            | ReleaseOutcome::AlreadyOpen { appointment } => appointment,
        }
    }
}

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::SlotError;

/// The two kinds of caller the kernel recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Claims and releases open slots
    Doctor,
    /// Publishes slots and may assign doctors directly
    Clinic,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Clinic => "clinic",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "doctor" => Ok(Role::Doctor),
            "clinic" => Ok(Role::Clinic),
            other => Err(SlotError::Validation(format!(
                "unknown role '{}', expected 'doctor' or 'clinic'",
                other
            ))),
        }
    }
}

/// A resolved caller. Passed into every kernel operation; the kernel trusts
/// the pair as-is for ownership checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub role: Role,
    pub id: String,
}

impl Identity {
    pub fn doctor(id: impl Into<String>) -> Self {
        Self {
            role: Role::Doctor,
            id: id.into(),
        }
    }

    pub fn clinic(id: impl Into<String>) -> Self {
        Self {
            role: Role::Clinic,
            id: id.into(),
        }
    }

    /// Returns the caller's id if they hold `role`, `Unauthorized` otherwise.
    pub fn require(&self, role: Role) -> Result<&str, SlotError> {
        if self.role == role {
            Ok(&self.id)
        } else {
            Err(SlotError::Unauthorized(format!(
                "operation requires the {} role, caller is a {}",
                role, self.role
            )))
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

/// Parses the `<role>:<id>` form produced by `Display`.
impl FromStr for Identity {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (role, id) = s
            .split_once(':')
            .ok_or_else(|| SlotError::Validation(format!("malformed identity '{}'", s)))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(SlotError::Validation("identity id is empty".into()));
        }
        Ok(Self {
            role: role.trim().parse()?,
            id: id.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub specialty: Option<String>,
}

/// A patient, scoped to the clinic that registered them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub clinic_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: String,
    pub name: String,
}

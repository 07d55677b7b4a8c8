use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{Appointment, AppointmentStatus, Doctor};

/// A clinic's doctors split by whether they currently hold a booking there.
/// Derived on every read from the clinic's appointments; never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorNetwork {
    pub in_network: Vec<Doctor>,
    pub out_of_network: Vec<Doctor>,
}

/// Partitions `doctors` into those holding at least one booked appointment
/// of `clinic_id` and the rest. Both halves are sorted by name.
pub fn partition_doctors(
    clinic_id: &str,
    doctors: Vec<Doctor>,
    appointments: &[Appointment],
) -> DoctorNetwork {
    let booked: HashSet<&str> = appointments
        .iter()
        .filter(|a| a.clinic_id == clinic_id && a.status == AppointmentStatus::Booked)
        .filter_map(|a| a.doctor_id.as_deref())
        .collect();

    let (mut in_network, mut out_of_network): (Vec<Doctor>, Vec<Doctor>) = doctors
        .into_iter()
        .partition(|d| booked.contains(d.id.as_str()));

    in_network.sort_by(|a, b| a.name.cmp(&b.name));
    out_of_network.sort_by(|a, b| a.name.cmp(&b.name));

    DoctorNetwork {
        in_network,
        out_of_network,
    }
}

//! SQLite-backed appointment store and directory.
//! Provides persistent storage across server restarts.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! slotline-core = { path = "../slotline-core", features = ["sqlite"] }
//! ```

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use std::sync::{Mutex, MutexGuard};

use crate::infrastructure::{
    AppointmentFilter, AppointmentStore, Directory, NewRow, RowGuard, RowPatch, StoreError,
    UpdateOutcome,
};
use crate::types::*;

const APPOINTMENT_COLUMNS: &str = "id, clinic_id, patient_id, doctor_id, date, notes, status";

/// Appointments and directory tables in one SQLite database.
///
/// Uses WAL mode for concurrent read performance. The connection sits behind
/// a mutex; each conditional update is a single `UPDATE ... WHERE` statement,
/// so the guard and the write are evaluated together by SQLite.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS clinics (
                id   TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS doctors (
                id        TEXT PRIMARY KEY,
                name      TEXT NOT NULL,
                specialty TEXT
            );

            CREATE TABLE IF NOT EXISTS patients (
                id        TEXT PRIMARY KEY,
                name      TEXT NOT NULL,
                clinic_id TEXT NOT NULL REFERENCES clinics(id)
            );
            CREATE INDEX IF NOT EXISTS idx_patients_clinic ON patients(clinic_id);

            CREATE TABLE IF NOT EXISTS appointments (
                id         TEXT PRIMARY KEY,
                clinic_id  TEXT NOT NULL,
                patient_id TEXT NOT NULL,
                doctor_id  TEXT,
                date       TEXT NOT NULL,
                notes      TEXT,
                status     TEXT NOT NULL DEFAULT 'open'
                           CHECK (status IN ('open', 'booked')),
                CHECK ((status = 'booked') = (doctor_id IS NOT NULL))
            );
            CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status, date);
            CREATE INDEX IF NOT EXISTS idx_appointments_clinic ON appointments(clinic_id, date);
            CREATE INDEX IF NOT EXISTS idx_appointments_doctor ON appointments(doctor_id, date);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn row_to_appointment(row: &rusqlite::Row) -> rusqlite::Result<Appointment> {
        Ok(Appointment {
            id: row.get(0)?,
            clinic_id: row.get(1)?,
            patient_id: row.get(2)?,
            doctor_id: row.get(3)?,
            date: row.get(4)?,
            notes: row.get(5)?,
            status: row.get(6)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Appointment>, StoreError> {
        let sql = format!("SELECT {} FROM appointments WHERE id = ?1", APPOINTMENT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_appointment)
            .optional()?)
    }
}

impl ToSql for AppointmentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AppointmentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

fn nullable(value: &Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}

impl AppointmentStore for SqliteStore {
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

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO appointments (id, clinic_id, patient_id, doctor_id, date, notes, status)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6)",
            params![
                appointment.id,
                appointment.clinic_id,
                appointment.patient_id,
                appointment.date,
                appointment.notes,
                appointment.status,
            ],
        )?;
        Ok(appointment)
    }

    fn conditional_update(
        &self,
        id: &str,
        patch: &RowPatch,
        guard: &RowGuard,
    ) -> Result<Option<UpdateOutcome>, StoreError> {
        let mut values: Vec<Value> = Vec::new();

        let mut sets = Vec::new();
        if let Some(status) = patch.status {
            values.push(Value::Text(status.as_str().to_string()));
            sets.push(format!("status = ?{}", values.len()));
        }
        if let Some(doctor_id) = &patch.doctor_id {
            values.push(nullable(doctor_id));
            sets.push(format!("doctor_id = ?{}", values.len()));
        }
        if let Some(notes) = &patch.notes {
            values.push(nullable(notes));
            sets.push(format!("notes = ?{}", values.len()));
        }

        values.push(Value::Text(id.to_string()));
        let mut wheres = vec![format!("id = ?{}", values.len())];
        if let Some(status) = guard.status {
            values.push(Value::Text(status.as_str().to_string()));
            wheres.push(format!("status = ?{}", values.len()));
        }
        if let Some(doctor_id) = &guard.doctor_id {
            values.push(Value::Text(doctor_id.clone()));
            wheres.push(format!("doctor_id = ?{}", values.len()));
        }
        if let Some(clinic_id) = &guard.clinic_id {
            values.push(Value::Text(clinic_id.clone()));
            wheres.push(format!("clinic_id = ?{}", values.len()));
        }

        let conn = self.lock()?;

        if sets.is_empty() {
            return Ok(Self::fetch(&conn, id)?.map(|row| UpdateOutcome {
                applied: guard.matches(&row),
                row,
            }));
        }

        let sql = format!(
            "UPDATE appointments SET {} WHERE {}",
            sets.join(", "),
            wheres.join(" AND ")
        );
        let changed = conn.execute(&sql, params_from_iter(values.iter()))?;

        Ok(Self::fetch(&conn, id)?.map(|row| UpdateOutcome {
            applied: changed > 0,
            row,
        }))
    }

    fn get(&self, id: &str) -> Result<Option<Appointment>, StoreError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let mut values: Vec<Value> = Vec::new();
        let mut wheres = Vec::new();
        if let Some(clinic_id) = &filter.clinic_id {
            values.push(Value::Text(clinic_id.clone()));
            wheres.push(format!("clinic_id = ?{}", values.len()));
        }
        if let Some(doctor_id) = &filter.doctor_id {
            values.push(Value::Text(doctor_id.clone()));
            wheres.push(format!("doctor_id = ?{}", values.len()));
        }
        if let Some(status) = filter.status {
            values.push(Value::Text(status.as_str().to_string()));
            wheres.push(format!("status = ?{}", values.len()));
        }

        let where_clause = if wheres.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", wheres.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM appointments {} ORDER BY date ASC, id ASC",
            APPOINTMENT_COLUMNS, where_clause
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_appointment)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl Directory for SqliteStore {
    fn add_clinic(&self, clinic: Clinic) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO clinics (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![clinic.id, clinic.name],
        )?;
        Ok(())
    }

    fn add_doctor(&self, doctor: Doctor) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO doctors (id, name, specialty) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, specialty = excluded.specialty",
            params![doctor.id, doctor.name, doctor.specialty],
        )?;
        Ok(())
    }

    fn add_patient(&self, patient: Patient) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO patients (id, name, clinic_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, clinic_id = excluded.clinic_id",
            params![patient.id, patient.name, patient.clinic_id],
        )?;
        Ok(())
    }

    fn clinic(&self, id: &str) -> Result<Option<Clinic>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name FROM clinics WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Clinic {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn doctor(&self, id: &str) -> Result<Option<Doctor>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name, specialty FROM doctors WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Doctor {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        specialty: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn patient(&self, id: &str) -> Result<Option<Patient>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name, clinic_id FROM patients WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Patient {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        clinic_id: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn clinics(&self) -> Result<Vec<Clinic>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM clinics ORDER BY name, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Clinic {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name, specialty FROM doctors ORDER BY name, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Doctor {
                id: row.get(0)?,
                name: row.get(1)?,
                specialty: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn patients_for_clinic(&self, clinic_id: &str) -> Result<Vec<Patient>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, clinic_id FROM patients WHERE clinic_id = ?1 ORDER BY name, id",
        )?;
        let rows = stmt.query_map(params![clinic_id], |row| {
            Ok(Patient {
                id: row.get(0)?,
                name: row.get(1)?,
                clinic_id: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

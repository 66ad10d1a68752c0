use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

// ═══════════════════════════════════════════
// Hospitalization repository
// ═══════════════════════════════════════════

pub fn insert_hospitalization(
    conn: &Connection,
    hosp: &Hospitalization,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO hospitalizations (id, pet_name, client_name, vet_name, box_label,
         status, admitted_at, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            hosp.id.to_string(),
            hosp.pet_name,
            hosp.client_name,
            hosp.vet_name,
            hosp.box_label,
            hosp.status.as_str(),
            hosp.admitted_at,
            hosp.notes,
        ],
    )?;
    Ok(())
}

pub fn get_hospitalization(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Hospitalization>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, pet_name, client_name, vet_name, box_label, status, admitted_at, notes
         FROM hospitalizations WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(HospitalizationRow {
                id: row.get(0)?,
                pet_name: row.get(1)?,
                client_name: row.get(2)?,
                vet_name: row.get(3)?,
                box_label: row.get(4)?,
                status: row.get(5)?,
                admitted_at: row.get(6)?,
                notes: row.get(7)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(hospitalization_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_hospitalization_status(
    conn: &Connection,
    id: &Uuid,
    status: HospitalizationStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE hospitalizations SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "hospitalization".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

struct HospitalizationRow {
    id: String,
    pet_name: String,
    client_name: String,
    vet_name: String,
    box_label: Option<String>,
    status: String,
    admitted_at: DateTime<Utc>,
    notes: Option<String>,
}

fn hospitalization_from_row(row: HospitalizationRow) -> Result<Hospitalization, DatabaseError> {
    Ok(Hospitalization {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        pet_name: row.pet_name,
        client_name: row.client_name,
        vet_name: row.vet_name,
        box_label: row.box_label,
        status: HospitalizationStatus::from_str(&row.status)?,
        admitted_at: row.admitted_at,
        notes: row.notes,
    })
}

// ═══════════════════════════════════════════
// Prescription repository
// ═══════════════════════════════════════════

/// Insert a prescription together with its full dose list.
pub fn insert_prescription(
    conn: &Connection,
    rx: &Prescription,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, hospitalization_id, medication, dosage, route,
         frequency, frequency_hours, start_date, active, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            rx.id.to_string(),
            rx.hospitalization_id.to_string(),
            rx.medication,
            rx.dosage,
            rx.route,
            rx.frequency,
            rx.frequency_hours,
            rx.start_date,
            rx.active as i32,
            rx.notes,
        ],
    )?;
    write_administrations(conn, &rx.id, &rx.administrations)?;
    Ok(())
}

pub fn get_prescription(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, hospitalization_id, medication, dosage, route, frequency,
         frequency_hours, start_date, active, notes
         FROM prescriptions WHERE id = ?1",
        params![id.to_string()],
        map_prescription_row,
    );

    match result {
        Ok(row) => {
            let mut rx = prescription_from_row(row)?;
            rx.administrations = fetch_administrations(conn, &rx.id)?;
            Ok(Some(rx))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All prescriptions of a hospitalization, active first, doses included.
pub fn list_prescriptions(
    conn: &Connection,
    hospitalization_id: &Uuid,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, hospitalization_id, medication, dosage, route, frequency,
         frequency_hours, start_date, active, notes
         FROM prescriptions
         WHERE hospitalization_id = ?1
         ORDER BY active DESC, start_date ASC",
    )?;
    let rows = stmt
        .query_map(params![hospitalization_id.to_string()], map_prescription_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut prescriptions = Vec::with_capacity(rows.len());
    for row in rows {
        let mut rx = prescription_from_row(row)?;
        rx.administrations = fetch_administrations(conn, &rx.id)?;
        prescriptions.push(rx);
    }
    Ok(prescriptions)
}

/// Delete a prescription; its administrations go with it (FK cascade).
pub fn delete_prescription_row(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM prescriptions WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "prescription".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn update_prescription_active(
    conn: &Connection,
    id: &Uuid,
    active: bool,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET active = ?1 WHERE id = ?2",
        params![active as i32, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "prescription".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Replace a prescription's dose list wholesale. Every mutation in the
/// service layer computes a full next value and writes it back through here,
/// inside that operation's transaction.
pub fn write_administrations(
    conn: &Connection,
    prescription_id: &Uuid,
    doses: &[Administration],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM administrations WHERE prescription_id = ?1",
        params![prescription_id.to_string()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO administrations (id, prescription_id, position, scheduled_time,
         status, administered_at, administered_by, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, dose) in doses.iter().enumerate() {
        stmt.execute(params![
            dose.id.to_string(),
            prescription_id.to_string(),
            position as i64,
            dose.scheduled_time,
            dose.status.as_str(),
            dose.administered_at,
            dose.administered_by,
            dose.notes,
        ])?;
    }
    Ok(())
}

fn fetch_administrations(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<Vec<Administration>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, scheduled_time, status, administered_at, administered_by, notes
         FROM administrations
         WHERE prescription_id = ?1
         ORDER BY position ASC",
    )?;
    let rows = stmt
        .query_map(params![prescription_id.to_string()], |row| {
            Ok(AdministrationRow {
                id: row.get(0)?,
                scheduled_time: row.get(1)?,
                status: row.get(2)?,
                administered_at: row.get(3)?,
                administered_by: row.get(4)?,
                notes: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(administration_from_row).collect()
}

// Internal row types for mapping

struct PrescriptionRow {
    id: String,
    hospitalization_id: String,
    medication: String,
    dosage: String,
    route: Option<String>,
    frequency: String,
    frequency_hours: u32,
    start_date: DateTime<Utc>,
    active: i32,
    notes: Option<String>,
}

fn map_prescription_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        hospitalization_id: row.get(1)?,
        medication: row.get(2)?,
        dosage: row.get(3)?,
        route: row.get(4)?,
        frequency: row.get(5)?,
        frequency_hours: row.get(6)?,
        start_date: row.get(7)?,
        active: row.get(8)?,
        notes: row.get(9)?,
    })
}

fn prescription_from_row(row: PrescriptionRow) -> Result<Prescription, DatabaseError> {
    Ok(Prescription {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        hospitalization_id: Uuid::parse_str(&row.hospitalization_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        medication: row.medication,
        dosage: row.dosage,
        route: row.route,
        frequency: row.frequency,
        frequency_hours: row.frequency_hours,
        start_date: row.start_date,
        active: row.active != 0,
        notes: row.notes,
        administrations: Vec::new(),
    })
}

struct AdministrationRow {
    id: String,
    scheduled_time: DateTime<Utc>,
    status: String,
    administered_at: Option<DateTime<Utc>>,
    administered_by: Option<String>,
    notes: Option<String>,
}

fn administration_from_row(row: AdministrationRow) -> Result<Administration, DatabaseError> {
    Ok(Administration {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        scheduled_time: row.scheduled_time,
        status: DoseStatus::from_str(&row.status)?,
        administered_at: row.administered_at,
        administered_by: row.administered_by,
        notes: row.notes,
    })
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

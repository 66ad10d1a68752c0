//! Hospitalization ward — prescription and dose-schedule operations.
//!
//! Service layer over the SQLite store: each operation loads the affected
//! prescription, applies the pure transition from [`crate::schedule`], and
//! writes the dose list back wholesale inside one transaction. Mutations are
//! only allowed while the parent hospitalization is active; that policy lives
//! here, not in the pure core.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::frequency::parse_frequency_hours;
use crate::models::enums::{DoseStatus, HospitalizationStatus};
use crate::models::{Administration, Hospitalization, Prescription};
use crate::schedule::{self, RecordDose, ScheduleError, DEFAULT_DAYS_AHEAD};

#[derive(Error, Debug)]
pub enum WardError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Hospitalization {0} is not active")]
    NotActive(Uuid),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ─── Input types ──────────────────────────────────────────────────────────────

/// Request to admit an animal to the ward.
#[derive(Debug, Clone, Deserialize)]
pub struct NewHospitalization {
    pub pet_name: String,
    pub client_name: String,
    pub vet_name: String,
    pub box_label: Option<String>,
    pub notes: Option<String>,
}

/// Request to add a prescription to an active hospitalization.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrescription {
    pub medication: String,
    pub dosage: String,
    pub route: Option<String>,
    /// Frequency descriptor as entered ("BID", "8/8h", ...).
    pub frequency: String,
    pub notes: Option<String>,
    /// Schedule coverage in days; 3 when unset.
    pub days_ahead: Option<u32>,
}

// ─── View types — serialised to frontend ──────────────────────────────────────

/// The treatment sheet for one hospitalization: every prescription with its
/// dose schedule, late statuses recomputed as of the read.
#[derive(Debug, Clone, Serialize)]
pub struct TreatmentSheet {
    pub hospitalization: Hospitalization,
    pub prescriptions: Vec<PrescriptionCard>,
}

/// One prescription on the treatment sheet.
#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionCard {
    pub prescription: Prescription,
    pub counts: DoseCounts,
    /// Earliest open (pending or late) dose, if any remain.
    pub next_due: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoseCounts {
    pub pending: u32,
    pub late: u32,
    pub done: u32,
    pub skipped: u32,
}

// ─── Hospitalization lifecycle ────────────────────────────────────────────────

/// Admit an animal; the new hospitalization starts `active` with no
/// prescriptions.
pub fn admit_hospitalization(
    conn: &Connection,
    input: NewHospitalization,
) -> Result<Hospitalization, WardError> {
    let hosp = Hospitalization {
        id: Uuid::new_v4(),
        pet_name: input.pet_name,
        client_name: input.client_name,
        vet_name: input.vet_name,
        box_label: input.box_label,
        status: HospitalizationStatus::Active,
        admitted_at: Utc::now(),
        notes: input.notes,
    };
    db::insert_hospitalization(conn, &hosp)?;
    tracing::info!(id = %hosp.id, pet = %hosp.pet_name, "Hospitalization admitted");
    Ok(hosp)
}

pub fn set_hospitalization_status(
    conn: &Connection,
    hospitalization_id: &Uuid,
    status: HospitalizationStatus,
) -> Result<(), WardError> {
    db::update_hospitalization_status(conn, hospitalization_id, status)?;
    tracing::info!(id = %hospitalization_id, status = status.as_str(), "Hospitalization status changed");
    Ok(())
}

// ─── Prescription container ───────────────────────────────────────────────────

/// Add a prescription to an active hospitalization, generating its full dose
/// schedule starting now.
pub fn add_prescription(
    conn: &mut Connection,
    hospitalization_id: &Uuid,
    input: NewPrescription,
) -> Result<Prescription, WardError> {
    if input.medication.trim().is_empty() {
        return Err(ScheduleError::Validation("medication").into());
    }

    let now = Utc::now();
    let frequency_hours = parse_frequency_hours(&input.frequency);
    let days_ahead = input.days_ahead.unwrap_or(DEFAULT_DAYS_AHEAD);

    let tx = conn.transaction().map_err(DatabaseError::from)?;
    let hosp = load_hospitalization(&tx, hospitalization_id)?;
    require_active(&hosp)?;

    let rx = Prescription {
        id: Uuid::new_v4(),
        hospitalization_id: hosp.id,
        medication: input.medication,
        dosage: input.dosage,
        route: input.route,
        frequency: input.frequency,
        frequency_hours,
        start_date: now,
        active: true,
        notes: input.notes,
        administrations: schedule::build_administrations(now, frequency_hours, days_ahead, now)?,
    };
    db::insert_prescription(&tx, &rx)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        id = %rx.id,
        medication = %rx.medication,
        doses = rx.administrations.len(),
        "Prescription added"
    );
    Ok(rx)
}

/// Delete a prescription and all of its doses.
pub fn delete_prescription(
    conn: &mut Connection,
    prescription_id: &Uuid,
) -> Result<(), WardError> {
    let tx = conn.transaction().map_err(DatabaseError::from)?;
    let rx = load_prescription(&tx, prescription_id)?;
    let hosp = load_hospitalization(&tx, &rx.hospitalization_id)?;
    require_active(&hosp)?;

    db::delete_prescription_row(&tx, prescription_id)?;
    tx.commit().map_err(DatabaseError::from)?;
    tracing::info!(id = %prescription_id, "Prescription deleted");
    Ok(())
}

/// Flip a prescription's active flag. Existing dose statuses are untouched;
/// inactive prescriptions stay on the sheet for history.
pub fn set_prescription_active(
    conn: &mut Connection,
    prescription_id: &Uuid,
    active: bool,
) -> Result<(), WardError> {
    let tx = conn.transaction().map_err(DatabaseError::from)?;
    let rx = load_prescription(&tx, prescription_id)?;
    let hosp = load_hospitalization(&tx, &rx.hospitalization_id)?;
    require_active(&hosp)?;

    db::update_prescription_active(&tx, prescription_id, active)?;
    tx.commit().map_err(DatabaseError::from)?;
    Ok(())
}

// ─── Dose operations ──────────────────────────────────────────────────────────

/// Record one dose as given or skipped. `actor` is the display name of
/// whoever is recording; it becomes `administered_by` for skipped doses when
/// the input leaves it blank.
pub fn record_administration(
    conn: &mut Connection,
    prescription_id: &Uuid,
    dose_id: &Uuid,
    input: RecordDose,
    actor: &str,
) -> Result<Prescription, WardError> {
    with_active_prescription(conn, prescription_id, |rx| {
        schedule::record_administration(rx, dose_id, input, actor, Utc::now())
    })
}

/// Move a not-yet-administered dose to a new time.
pub fn reschedule_dose(
    conn: &mut Connection,
    prescription_id: &Uuid,
    dose_id: &Uuid,
    new_time: DateTime<Utc>,
) -> Result<Prescription, WardError> {
    with_active_prescription(conn, prescription_id, |rx| {
        schedule::reschedule_dose(rx, dose_id, new_time, Utc::now())
    })
}

/// Remove one dose from a prescription's schedule.
pub fn delete_dose(
    conn: &mut Connection,
    prescription_id: &Uuid,
    dose_id: &Uuid,
) -> Result<Prescription, WardError> {
    with_active_prescription(conn, prescription_id, |rx| {
        schedule::delete_dose(rx, dose_id)
    })
}

/// Load-apply-store for one prescription: the pure transition runs on an
/// owned copy and the resulting dose list replaces the stored one, all inside
/// a single transaction. On any error the store is left as it was.
fn with_active_prescription(
    conn: &mut Connection,
    prescription_id: &Uuid,
    op: impl FnOnce(Prescription) -> Result<Prescription, ScheduleError>,
) -> Result<Prescription, WardError> {
    let tx = conn.transaction().map_err(DatabaseError::from)?;
    let rx = load_prescription(&tx, prescription_id)?;
    let hosp = load_hospitalization(&tx, &rx.hospitalization_id)?;
    require_active(&hosp)?;

    let updated = op(rx)?;
    db::write_administrations(&tx, prescription_id, &updated.administrations)?;
    tx.commit().map_err(DatabaseError::from)?;
    Ok(updated)
}

// ─── Treatment sheet (read path) ──────────────────────────────────────────────

/// Assemble the treatment sheet for a hospitalization.
///
/// Late statuses are recomputed against the current time in the returned
/// view only; nothing is written back. Mutating operations persist their own
/// refresh, so the store converges without a background sweep.
pub fn fetch_treatment_sheet(
    conn: &Connection,
    hospitalization_id: &Uuid,
) -> Result<TreatmentSheet, WardError> {
    let hospitalization = load_hospitalization(conn, hospitalization_id)?;
    let now = Utc::now();

    let prescriptions = db::list_prescriptions(conn, hospitalization_id)?
        .into_iter()
        .map(|rx| {
            let administrations = schedule::refresh_late_statuses(rx.administrations, now);
            let counts = count_doses(&administrations);
            let next_due = administrations
                .iter()
                .filter(|d| d.status.is_open())
                .map(|d| d.scheduled_time)
                .min();
            PrescriptionCard {
                prescription: Prescription {
                    administrations,
                    ..rx
                },
                counts,
                next_due,
            }
        })
        .collect();

    Ok(TreatmentSheet {
        hospitalization,
        prescriptions,
    })
}

fn count_doses(doses: &[Administration]) -> DoseCounts {
    let mut counts = DoseCounts::default();
    for dose in doses {
        match dose.status {
            DoseStatus::Pending => counts.pending += 1,
            DoseStatus::Late => counts.late += 1,
            DoseStatus::Done => counts.done += 1,
            DoseStatus::Skipped => counts.skipped += 1,
        }
    }
    counts
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn load_hospitalization(
    conn: &Connection,
    id: &Uuid,
) -> Result<Hospitalization, WardError> {
    db::get_hospitalization(conn, id)?.ok_or(WardError::NotFound {
        entity: "hospitalization",
        id: *id,
    })
}

fn load_prescription(conn: &Connection, id: &Uuid) -> Result<Prescription, WardError> {
    db::get_prescription(conn, id)?.ok_or(WardError::NotFound {
        entity: "prescription",
        id: *id,
    })
}

fn require_active(hosp: &Hospitalization) -> Result<(), WardError> {
    if hosp.status != HospitalizationStatus::Active {
        return Err(WardError::NotActive(hosp.id));
    }
    Ok(())
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

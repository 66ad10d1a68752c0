//! Dose schedule generation and the per-dose status lifecycle.
//!
//! Everything here is pure: operations consume a [`Prescription`] and return
//! a new one with fresh dose values, never mutating doses in place. The
//! service layer in [`crate::hospitalization`] wraps these in read-modify-write
//! transactions.
//!
//! Status lifecycle:
//!
//! ```text
//! pending ──(time passes, re-scan)──> late
//! pending/late ──record──> done
//! pending/late ──record(skipped)──> skipped
//! done, skipped: terminal
//! ```
//!
//! `pending → late` is recomputed lazily on reads and recordings, not by a
//! background timer.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::enums::DoseStatus;
use crate::models::{Administration, Prescription};

/// How far ahead a schedule covers when the prescriber does not say.
pub const DEFAULT_DAYS_AHEAD: u32 = 3;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Required field is empty: {0}")]
    Validation(&'static str),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid frequency interval: {hours}h")]
    InvalidFrequency { hours: u32 },

    #[error("Dose not found: {0}")]
    DoseNotFound(Uuid),
}

/// Input for recording one dose as given or skipped.
#[derive(Debug, Clone, Default)]
pub struct RecordDose {
    pub administered_by: Option<String>,
    pub administered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub skipped: bool,
}

/// Generate the dose slots for one prescription.
///
/// Slots run from `start` in steps of `frequency_hours` up to and including
/// the `start + days_ahead` boundary, each classified as pending or late
/// against `now` at generation time.
pub fn build_administrations(
    start: DateTime<Utc>,
    frequency_hours: u32,
    days_ahead: u32,
    now: DateTime<Utc>,
) -> Result<Vec<Administration>, ScheduleError> {
    if frequency_hours == 0 {
        return Err(ScheduleError::InvalidFrequency {
            hours: frequency_hours,
        });
    }

    let end = start + Duration::days(i64::from(days_ahead));
    let step = Duration::hours(i64::from(frequency_hours));

    let mut doses = Vec::new();
    let mut current = start;
    while current <= end {
        doses.push(Administration::scheduled(current, now));
        current += step;
    }
    Ok(doses)
}

/// Flip pending doses whose time has passed into late. Owned in, owned out;
/// done and skipped doses pass through untouched.
pub fn refresh_late_statuses(
    doses: Vec<Administration>,
    now: DateTime<Utc>,
) -> Vec<Administration> {
    doses
        .into_iter()
        .map(|dose| {
            if dose.status == DoseStatus::Pending && dose.scheduled_time < now {
                Administration {
                    status: DoseStatus::Late,
                    ..dose
                }
            } else {
                dose
            }
        })
        .collect()
}

/// Record one dose as given (or skipped) and return the updated prescription.
///
/// The target must still be open (pending or late). Recording also re-scans
/// the remaining pending doses and flips past-due ones to late, so the
/// schedule's bookkeeping is current after every recording.
pub fn record_administration(
    prescription: Prescription,
    dose_id: &Uuid,
    input: RecordDose,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Prescription, ScheduleError> {
    let target = prescription
        .administrations
        .iter()
        .find(|d| d.id == *dose_id)
        .ok_or(ScheduleError::DoseNotFound(*dose_id))?;

    if !target.status.is_open() {
        return Err(ScheduleError::InvalidTransition(format!(
            "dose is already {}",
            target.status.as_str()
        )));
    }

    let administered_by = if input.skipped {
        match input.administered_by.filter(|s| !s.trim().is_empty()) {
            Some(by) => by,
            None => actor.to_string(),
        }
    } else {
        input
            .administered_by
            .filter(|s| !s.trim().is_empty())
            .ok_or(ScheduleError::Validation("administered_by"))?
    };

    let recorded = Administration {
        status: if input.skipped {
            DoseStatus::Skipped
        } else {
            DoseStatus::Done
        },
        administered_at: Some(input.administered_at.unwrap_or(now)),
        administered_by: Some(administered_by),
        notes: input.notes,
        ..target.clone()
    };

    let administrations = prescription
        .administrations
        .into_iter()
        .map(|dose| if dose.id == *dose_id { recorded.clone() } else { dose })
        .collect();

    Ok(Prescription {
        administrations: refresh_late_statuses(administrations, now),
        ..prescription
    })
}

/// Move an open dose to a new time, reclassifying it against `now`.
/// Sibling doses are left exactly as they were.
pub fn reschedule_dose(
    prescription: Prescription,
    dose_id: &Uuid,
    new_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Prescription, ScheduleError> {
    let target = prescription
        .administrations
        .iter()
        .find(|d| d.id == *dose_id)
        .ok_or(ScheduleError::DoseNotFound(*dose_id))?;

    if !target.status.is_open() {
        return Err(ScheduleError::InvalidTransition(format!(
            "dose is already {}",
            target.status.as_str()
        )));
    }

    let moved = Administration {
        scheduled_time: new_time,
        status: if new_time < now {
            DoseStatus::Late
        } else {
            DoseStatus::Pending
        },
        ..target.clone()
    };

    let administrations = prescription
        .administrations
        .into_iter()
        .map(|dose| if dose.id == *dose_id { moved.clone() } else { dose })
        .collect();

    Ok(Prescription {
        administrations,
        ..prescription
    })
}

/// Remove one dose from the schedule. Sibling doses are untouched.
pub fn delete_dose(
    prescription: Prescription,
    dose_id: &Uuid,
) -> Result<Prescription, ScheduleError> {
    if !prescription.administrations.iter().any(|d| d.id == *dose_id) {
        return Err(ScheduleError::DoseNotFound(*dose_id));
    }

    let administrations = prescription
        .administrations
        .into_iter()
        .filter(|dose| dose.id != *dose_id)
        .collect();

    Ok(Prescription {
        administrations,
        ..prescription
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn test_prescription(doses: Vec<Administration>) -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            hospitalization_id: Uuid::new_v4(),
            medication: "Amoxicillin".into(),
            dosage: "250mg".into(),
            route: Some("oral".into()),
            frequency: "8/8h".into(),
            frequency_hours: 8,
            start_date: utc(2024, 1, 1, 0),
            active: true,
            notes: None,
            administrations: doses,
        }
    }

    // ─── Generation ───

    #[test]
    fn eight_hourly_over_three_days_yields_ten_slots() {
        let start = utc(2024, 1, 1, 0);
        let doses = build_administrations(start, 8, 3, start).unwrap();
        assert_eq!(doses.len(), 10);
        assert_eq!(doses[0].scheduled_time, start);
        // The slot exactly on the 3-day boundary is included.
        assert_eq!(doses[9].scheduled_time, utc(2024, 1, 4, 0));
    }

    #[test]
    fn slots_are_exactly_spaced_and_increasing() {
        let start = utc(2024, 1, 1, 0);
        let doses = build_administrations(start, 6, 2, start).unwrap();
        assert_eq!(doses.len(), 2 * 24 / 6 + 1);
        for pair in doses.windows(2) {
            assert_eq!(
                pair[1].scheduled_time - pair[0].scheduled_time,
                Duration::hours(6)
            );
        }
    }

    #[test]
    fn slot_count_matches_closed_form() {
        let start = utc(2024, 1, 1, 0);
        for (hours, days) in [(8u32, 3u32), (12, 3), (24, 3), (6, 1), (5, 2)] {
            let doses = build_administrations(start, hours, days, start).unwrap();
            assert_eq!(
                doses.len() as u32,
                days * 24 / hours + 1,
                "hours={hours} days={days}"
            );
        }
    }

    #[test]
    fn past_slots_start_late_future_slots_pending() {
        let start = utc(2024, 1, 1, 0);
        let now = utc(2024, 1, 2, 4); // 28h in: slots 0..=3 are past
        let doses = build_administrations(start, 8, 3, now).unwrap();
        for dose in &doses {
            let expected = if dose.scheduled_time < now {
                DoseStatus::Late
            } else {
                DoseStatus::Pending
            };
            assert_eq!(dose.status, expected);
        }
        assert_eq!(doses[3].status, DoseStatus::Late); // 24h slot
        assert_eq!(doses[4].status, DoseStatus::Pending); // 32h slot
    }

    #[test]
    fn zero_interval_is_rejected() {
        let start = utc(2024, 1, 1, 0);
        let err = build_administrations(start, 0, 3, start).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidFrequency { hours: 0 }));
    }

    // ─── Recording ───

    #[test]
    fn recording_a_pending_dose_marks_it_done() {
        let now = utc(2024, 1, 1, 12);
        let start = utc(2024, 1, 1, 0);
        let rx = test_prescription(build_administrations(start, 8, 1, now).unwrap());
        let dose_id = rx.administrations[2].id; // 16:00, still pending
        let given_at = utc(2024, 1, 1, 11);

        let updated = record_administration(
            rx,
            &dose_id,
            RecordDose {
                administered_by: Some("Dr. X".into()),
                administered_at: Some(given_at),
                notes: Some("no reaction".into()),
                skipped: false,
            },
            "Reception",
            now,
        )
        .unwrap();

        let dose = updated
            .administrations
            .iter()
            .find(|d| d.id == dose_id)
            .unwrap();
        assert_eq!(dose.status, DoseStatus::Done);
        assert_eq!(dose.administered_at, Some(given_at));
        assert_eq!(dose.administered_by.as_deref(), Some("Dr. X"));
        assert_eq!(dose.notes.as_deref(), Some("no reaction"));
    }

    #[test]
    fn recording_defaults_administered_at_to_now() {
        let now = utc(2024, 1, 1, 9);
        let start = utc(2024, 1, 1, 0);
        let rx = test_prescription(build_administrations(start, 8, 1, now).unwrap());
        let dose_id = rx.administrations[0].id;

        let updated = record_administration(
            rx,
            &dose_id,
            RecordDose {
                administered_by: Some("Dr. X".into()),
                ..Default::default()
            },
            "Dr. X",
            now,
        )
        .unwrap();
        assert_eq!(updated.administrations[0].administered_at, Some(now));
    }

    #[test]
    fn recording_without_actor_name_is_rejected() {
        let now = utc(2024, 1, 1, 9);
        let rx = test_prescription(build_administrations(now, 8, 1, now).unwrap());
        let dose_id = rx.administrations[0].id;

        for by in [None, Some(String::new()), Some("   ".into())] {
            let err = record_administration(
                rx.clone(),
                &dose_id,
                RecordDose {
                    administered_by: by,
                    ..Default::default()
                },
                "Reception",
                now,
            )
            .unwrap_err();
            assert!(matches!(err, ScheduleError::Validation("administered_by")));
        }
    }

    #[test]
    fn skipping_falls_back_to_recording_actor() {
        let now = utc(2024, 1, 1, 9);
        let rx = test_prescription(build_administrations(now, 8, 1, now).unwrap());
        let dose_id = rx.administrations[0].id;

        let updated = record_administration(
            rx,
            &dose_id,
            RecordDose {
                skipped: true,
                ..Default::default()
            },
            "Dr. Lima",
            now,
        )
        .unwrap();
        let dose = &updated.administrations[0];
        assert_eq!(dose.status, DoseStatus::Skipped);
        assert_eq!(dose.administered_by.as_deref(), Some("Dr. Lima"));
        assert_eq!(dose.administered_at, Some(now));
    }

    #[test]
    fn recording_refreshes_late_bookkeeping_on_siblings() {
        let start = utc(2024, 1, 1, 0);
        // Generate while everything is in the future, then let time pass.
        let rx = test_prescription(build_administrations(start, 8, 1, start).unwrap());
        assert!(rx
            .administrations
            .iter()
            .all(|d| d.status == DoseStatus::Pending));

        let now = utc(2024, 1, 1, 10); // 00:00 and 08:00 are past now
        let dose_id = rx.administrations[0].id;
        let updated = record_administration(
            rx,
            &dose_id,
            RecordDose {
                administered_by: Some("Dr. X".into()),
                ..Default::default()
            },
            "Dr. X",
            now,
        )
        .unwrap();

        assert_eq!(updated.administrations[0].status, DoseStatus::Done);
        assert_eq!(updated.administrations[1].status, DoseStatus::Late);
        assert_eq!(updated.administrations[2].status, DoseStatus::Pending);
    }

    #[test]
    fn done_and_skipped_are_terminal() {
        let now = utc(2024, 1, 1, 9);
        let rx = test_prescription(build_administrations(now, 8, 1, now).unwrap());
        let dose_id = rx.administrations[0].id;

        let rx = record_administration(
            rx,
            &dose_id,
            RecordDose {
                administered_by: Some("Dr. X".into()),
                ..Default::default()
            },
            "Dr. X",
            now,
        )
        .unwrap();

        let again = record_administration(
            rx.clone(),
            &dose_id,
            RecordDose {
                administered_by: Some("Dr. Y".into()),
                ..Default::default()
            },
            "Dr. Y",
            now,
        );
        assert!(matches!(again, Err(ScheduleError::InvalidTransition(_))));

        let moved = reschedule_dose(rx, &dose_id, now + Duration::hours(1), now);
        assert!(matches!(moved, Err(ScheduleError::InvalidTransition(_))));
    }

    #[test]
    fn unknown_dose_id_is_reported() {
        let now = utc(2024, 1, 1, 9);
        let rx = test_prescription(build_administrations(now, 8, 1, now).unwrap());
        let missing = Uuid::new_v4();
        let err = record_administration(
            rx,
            &missing,
            RecordDose::default(),
            "Dr. X",
            now,
        )
        .unwrap_err();
        assert!(matches!(err, ScheduleError::DoseNotFound(id) if id == missing));
    }

    // ─── Maintenance ───

    #[test]
    fn rescheduling_recomputes_status() {
        let now = utc(2024, 1, 2, 0);
        let start = utc(2024, 1, 1, 0);
        let rx = test_prescription(build_administrations(start, 8, 3, now).unwrap());
        let late_id = rx.administrations[0].id;

        // Late dose moved into the future becomes pending again.
        let rx = reschedule_dose(rx, &late_id, now + Duration::hours(2), now).unwrap();
        assert_eq!(rx.administrations[0].status, DoseStatus::Pending);
        assert_eq!(rx.administrations[0].scheduled_time, now + Duration::hours(2));

        // And back into the past becomes late.
        let rx = reschedule_dose(rx, &late_id, now - Duration::hours(1), now).unwrap();
        assert_eq!(rx.administrations[0].status, DoseStatus::Late);
    }

    #[test]
    fn rescheduling_leaves_siblings_alone() {
        let start = utc(2024, 1, 1, 0);
        let rx = test_prescription(build_administrations(start, 8, 1, start).unwrap());
        let before: Vec<_> = rx
            .administrations
            .iter()
            .map(|d| (d.id, d.scheduled_time, d.status))
            .collect();
        let target = rx.administrations[1].id;

        // `now` far in the future: a full re-scan would flip everything late.
        let now = utc(2024, 1, 3, 0);
        let rx = reschedule_dose(rx, &target, now + Duration::hours(1), now).unwrap();

        for (i, dose) in rx.administrations.iter().enumerate() {
            if dose.id == target {
                continue;
            }
            assert_eq!((dose.id, dose.scheduled_time, dose.status), before[i]);
        }
    }

    #[test]
    fn deleting_a_dose_removes_only_that_dose() {
        let start = utc(2024, 1, 1, 0);
        let rx = test_prescription(build_administrations(start, 8, 1, start).unwrap());
        let target = rx.administrations[1].id;
        let survivors: Vec<_> = rx
            .administrations
            .iter()
            .filter(|d| d.id != target)
            .map(|d| (d.id, d.scheduled_time, d.status))
            .collect();

        let rx = delete_dose(rx, &target).unwrap();
        assert_eq!(rx.administrations.len(), survivors.len());
        for (i, dose) in rx.administrations.iter().enumerate() {
            assert_eq!((dose.id, dose.scheduled_time, dose.status), survivors[i]);
        }
    }

    #[test]
    fn deleting_unknown_dose_is_reported() {
        let start = utc(2024, 1, 1, 0);
        let rx = test_prescription(build_administrations(start, 8, 1, start).unwrap());
        let err = delete_dose(rx, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ScheduleError::DoseNotFound(_)));
    }

    #[test]
    fn refresh_does_not_touch_terminal_doses() {
        let now = utc(2024, 1, 1, 9);
        let start = utc(2024, 1, 1, 0);
        let rx = test_prescription(build_administrations(start, 8, 1, now).unwrap());
        let dose_id = rx.administrations[0].id;
        let rx = record_administration(
            rx,
            &dose_id,
            RecordDose {
                skipped: true,
                ..Default::default()
            },
            "Dr. X",
            now,
        )
        .unwrap();

        let refreshed = refresh_late_statuses(rx.administrations, utc(2024, 1, 5, 0));
        assert_eq!(refreshed[0].status, DoseStatus::Skipped);
        assert!(refreshed[1..]
            .iter()
            .all(|d| d.status == DoseStatus::Late));
    }
}

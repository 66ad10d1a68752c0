use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DoseStatus, HospitalizationStatus};

/// A clinical episode: an animal admitted to a ward box. Owns zero or more
/// prescriptions; all scheduling operations are scoped to one hospitalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hospitalization {
    pub id: Uuid,
    pub pet_name: String,
    pub client_name: String,
    pub vet_name: String,
    pub box_label: Option<String>,
    pub status: HospitalizationStatus,
    pub admitted_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// A clinician's order for one medication during a hospitalization, together
/// with its generated dose schedule.
///
/// `frequency` keeps the descriptor as entered ("BID", "8/8h", ...);
/// `frequency_hours` is the interval resolved from it at creation time, so
/// the schedule stays stable even if parsing rules change later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub hospitalization_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub route: Option<String>,
    pub frequency: String,
    pub frequency_hours: u32,
    pub start_date: DateTime<Utc>,
    pub active: bool,
    pub notes: Option<String>,
    /// Schedule order; `scheduled_time` is non-decreasing across this list
    /// except after manual reschedules.
    pub administrations: Vec<Administration>,
}

/// One scheduled instance of giving a prescribed medication.
///
/// Invariant: `administered_at`/`administered_by` are set if and only if
/// `status` is `done` or `skipped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Administration {
    pub id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub status: DoseStatus,
    pub administered_at: Option<DateTime<Utc>>,
    pub administered_by: Option<String>,
    pub notes: Option<String>,
}

impl Administration {
    /// A fresh slot at `scheduled_time`, already classified against `now`.
    pub fn scheduled(scheduled_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scheduled_time,
            status: if scheduled_time < now {
                DoseStatus::Late
            } else {
                DoseStatus::Pending
            },
            administered_at: None,
            administered_by: None,
            notes: None,
        }
    }
}

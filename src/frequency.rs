//! Frequency descriptor parsing.
//!
//! Clinicians enter dosing frequency as free text or a preset: Latin
//! abbreviations ("BID"), per-day counts ("2x/dia") or interval notation
//! ("12/12h"). All of them resolve to an interval in hours.

use std::sync::LazyLock;

use regex::Regex;

/// "N/Mh" — M is the repeat interval, N the per-day count.
static INTERVAL_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)/(\d+)h$").unwrap());

/// Bare "Nh".
static INTERVAL_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)h$").unwrap());

/// Fallback interval when a descriptor cannot be resolved.
pub const DEFAULT_FREQUENCY_HOURS: u32 = 8;

/// Resolve a frequency descriptor to an interval in hours.
///
/// Case-insensitive and whitespace-tolerant. Unrecognized descriptors
/// resolve to [`DEFAULT_FREQUENCY_HOURS`] rather than failing; this matches
/// what the clinic's entry form has always done, so callers must not rely on
/// this function for validation.
pub fn parse_frequency_hours(descriptor: &str) -> u32 {
    let normalized = descriptor.trim().to_lowercase();

    match normalized.as_str() {
        "sid" | "1x/dia" | "24/24h" => return 24,
        "bid" | "2x/dia" | "12/12h" => return 12,
        "tid" | "3x/dia" | "8/8h" => return 8,
        "qid" | "4x/dia" | "6/6h" => return 6,
        _ => {}
    }

    if let Some(caps) = INTERVAL_PAIR.captures(&normalized) {
        if let Ok(hours) = caps[2].parse::<u32>() {
            return hours;
        }
    }

    if let Some(caps) = INTERVAL_BARE.captures(&normalized) {
        if let Ok(hours) = caps[1].parse::<u32>() {
            return hours;
        }
    }

    tracing::warn!(descriptor, "Unrecognized frequency, assuming every {DEFAULT_FREQUENCY_HOURS}h");
    DEFAULT_FREQUENCY_HOURS
}

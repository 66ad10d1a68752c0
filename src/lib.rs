//! Vetward — medication administration scheduling for a veterinary ward.
//!
//! Prescriptions added to an active hospitalization get a generated dose
//! schedule; doses move through pending → late → done/skipped as staff record
//! them. Everything persists to a local SQLite database.

pub mod config;
pub mod db;
pub mod frequency;
pub mod hospitalization;
pub mod models;
pub mod schedule;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries embedding this crate.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}

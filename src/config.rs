use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Vetward";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset
pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/Vetward/ on all platforms (user-visible, clinics back it up by hand)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Vetward")
}

/// Default location of the ward database
pub fn database_path() -> PathBuf {
    app_data_dir().join("ward.db")
}

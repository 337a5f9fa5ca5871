// libscan - bundled library reconciliation scanner
//
// This is the library crate containing the scanning engine and its ambient
// configuration, logging and metrics. The binary crate (main.rs) runs a scan
// over a catalog file.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::ScanMetrics;
pub use models::{AvailabilityStatus, ScanProgress, SeasonFact, SessionId, Settings};
pub use services::{KeyedLock, LibraryReconciler, RunOptions, ScanError, Scanner};
pub use state::{ScanEvent, ScanStateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

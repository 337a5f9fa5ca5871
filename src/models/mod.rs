//! Data models for the scanner.
//!
//! - [`media`]: availability statuses, season facts and persisted media records
//! - [`config`]: settings loaded by [`ConfigManager`](crate::config::ConfigManager)
//!   and the catalog format read by the binary
//! - [`scan_state`]: session and progress state owned by
//!   [`ScanStateManager`](crate::state::ScanStateManager)

pub mod config;
pub mod media;
pub mod scan_state;

pub use config::{Catalog, CatalogMovie, CatalogShow, LoggingSettings, ScannerSettings, Settings};
pub use media::{
    AvailabilityStatus, MediaIds, MediaRecord, MediaType, ProcessOptions, SeasonFact, SeasonRecord,
};
pub use scan_state::{ScanProgress, ScanState, SessionId};

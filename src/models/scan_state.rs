use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Token identifying one scan attempt.
///
/// A loop captures the id returned by
/// [`ScanStateManager::start_run`](crate::state::ScanStateManager::start_run)
/// and compares it with the current one at every bundle boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Mutable state of one scanner instance.
///
/// Wrapped in `Arc<RwLock<_>>` by [`crate::state::ScanStateManager`]; never
/// mutate it directly, go through the manager so events are emitted.
#[derive(Clone, Debug, Default)]
pub struct ScanState {
    pub scanner_name: String,
    pub session_id: Option<SessionId>,
    pub running: bool,

    /// Starting index of the bundle most recently dispatched.
    pub progress: usize,
    pub total: usize,
}

impl ScanState {
    pub fn new(scanner_name: impl Into<String>) -> Self {
        Self {
            scanner_name: scanner_name.into(),
            ..Self::default()
        }
    }

    pub fn is_current(&self, session: SessionId) -> bool {
        self.session_id == Some(session)
    }

    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            scanner_name: self.scanner_name.clone(),
            session_id: self.session_id,
            running: self.running,
            progress: self.progress,
            total: self.total,
        }
    }
}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub scanner_name: String,
    pub session_id: Option<SessionId>,
    pub running: bool,
    pub progress: usize,
    pub total: usize,
}

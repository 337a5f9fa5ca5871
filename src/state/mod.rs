// Scan session state
//
// ScanStateManager owns the running flag, the current session id and the
// progress counters of one scanner instance, and publishes change events for
// status reporters.

use crate::models::{ScanProgress, ScanState, SessionId};
use crate::services::ScanError;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Change events emitted when scan state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum ScanEvent {
    /// A new session became current
    RunStarted { session: SessionId },

    /// Progress or total changed
    ProgressUpdated { progress: usize, total: usize },

    /// The current session ended normally
    RunFinished { session: SessionId, progress: usize },

    /// The running flag was cleared by `cancel()`
    RunCancelled { session: Option<SessionId> },
}

/// Session guard for a scanner instance
///
/// - [`start_run()`](Self::start_run) issues a fresh [`SessionId`] and marks the
///   scanner running
/// - [`end_run()`](Self::end_run) clears the running flag only for the current
///   session, so a superseded run finishing late cannot clobber a newer one
/// - [`cancel()`](Self::cancel) clears the running flag unconditionally
/// - [`checkpoint()`](Self::checkpoint) is the liveness check a scan loop runs
///   at every bundle boundary
///
/// Clones share the same state and event channel.
#[derive(Debug)]
pub struct ScanStateManager {
    state: Arc<RwLock<ScanState>>,
    event_tx: broadcast::Sender<ScanEvent>,
}

impl ScanStateManager {
    /// Create a manager in the idle state with a 100 event buffer
    pub fn new(scanner_name: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(ScanState::new(scanner_name))),
            event_tx,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ScanState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ScanState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ScanState {
        self.read_state().clone()
    }

    /// `{running, progress, total}` of the scanner
    pub fn status(&self) -> ScanProgress {
        self.read_state().progress()
    }

    pub fn is_running(&self) -> bool {
        self.read_state().running
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.read_state().session_id
    }

    /// Apply a mutation, then emit events for whatever changed
    fn update<F, R>(&self, update_fn: F) -> R
    where
        F: FnOnce(&mut ScanState) -> R,
    {
        let (result, changes) = {
            let mut state = self.write_state();
            let old_state = state.clone();
            let result = update_fn(&mut state);
            (result, Self::detect_changes(&old_state, &state))
        };

        for change in changes {
            // No subscribers is fine
            let _ = self.event_tx.send(change);
        }

        result
    }

    fn detect_changes(old: &ScanState, new: &ScanState) -> Vec<ScanEvent> {
        let mut changes = Vec::new();

        if let Some(session) = new.session_id {
            if old.session_id != new.session_id && new.running {
                changes.push(ScanEvent::RunStarted { session });
            }
        }

        if old.progress != new.progress || old.total != new.total {
            changes.push(ScanEvent::ProgressUpdated {
                progress: new.progress,
                total: new.total,
            });
        }

        changes
    }

    /// Subscribe to scan events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.event_tx.subscribe()
    }

    /// Begin a new session; returns the token the scan loop must carry
    pub fn start_run(&self) -> SessionId {
        let session = SessionId::new();
        self.update(|state| {
            state.session_id = Some(session);
            state.running = true;
            state.progress = 0;
            state.total = 0;
        });
        session
    }

    /// End `session`; a no-op returning `false` when it is no longer current
    pub fn end_run(&self, session: SessionId) -> bool {
        let ended = self.update(|state| {
            if !state.is_current(session) {
                return None;
            }
            let was_running = state.running;
            state.running = false;
            Some((was_running, state.progress))
        });

        match ended {
            Some((was_running, progress)) => {
                if was_running {
                    let _ = self
                        .event_tx
                        .send(ScanEvent::RunFinished { session, progress });
                }
                true
            }
            None => false,
        }
    }

    /// Clear the running flag regardless of session
    pub fn cancel(&self) {
        let (was_running, session) = self.update(|state| {
            let was_running = state.running;
            state.running = false;
            (was_running, state.session_id)
        });

        if was_running {
            let _ = self.event_tx.send(ScanEvent::RunCancelled { session });
        }
    }

    /// Record the item count of `session`'s run
    pub fn set_total(&self, session: SessionId, total: usize) {
        self.update(|state| {
            if state.is_current(session) {
                state.total = total;
            }
        });
    }

    /// Liveness check for `session` at a continuation point
    ///
    /// Fails with [`ScanError::Aborted`] when the running flag has been
    /// cleared and [`ScanError::Superseded`] when another session became
    /// current. On success `progress`, if given, is recorded under the same
    /// write lock as the check.
    pub fn checkpoint(&self, session: SessionId, progress: Option<usize>) -> Result<(), ScanError> {
        self.update(|state| {
            if !state.running {
                return Err(ScanError::Aborted);
            }
            if !state.is_current(session) {
                return Err(ScanError::Superseded);
            }
            if let Some(progress) = progress {
                // Never move backwards within a session
                state.progress = state.progress.max(progress);
            }
            Ok(())
        })
    }
}

impl Clone for ScanStateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            event_tx: self.event_tx.clone(),
        }
    }
}

use super::model::RosterEntry;
use super::{SessionError, SessionState};
use crate::backend::{Backend, BackendError};

/// Result of a roster fetch. A failed fetch still yields a (empty) roster so
/// the caller can render; the error is reported alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterLoad {
    pub roster: Vec<RosterEntry>,
    pub error: Option<BackendError>,
}

/// Fetches the roster for a class+batch pair. Either filter missing means no
/// request is made. No retry.
pub fn load_roster<B: Backend + ?Sized>(backend: &B, class_id: &str, batch_id: &str) -> RosterLoad {
    if class_id.trim().is_empty() || batch_id.trim().is_empty() {
        return RosterLoad {
            roster: Vec::new(),
            error: None,
        };
    }
    match backend.fetch_roster(class_id, batch_id) {
        Ok(roster) => {
            tracing::debug!(class = class_id, batch = batch_id, students = roster.len(), "roster loaded");
            RosterLoad {
                roster,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(class = class_id, batch = batch_id, error = %e, "roster fetch failed");
            RosterLoad {
                roster: Vec::new(),
                error: Some(e),
            }
        }
    }
}

impl SessionState {
    /// Loads the roster for a class+batch into the cache, replacing whatever
    /// was there. Any resolved or in-flight record is invalidated and the
    /// temporal discriminator must be chosen again.
    pub fn load_roster<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        class_id: &str,
        batch_id: &str,
    ) -> Result<&[RosterEntry], SessionError> {
        let load = load_roster(backend, class_id, batch_id);
        if let Some(key) = self.key.as_mut() {
            key.class_id = class_id.to_string();
            key.batch_id = batch_id.to_string();
        }
        self.reset_discriminator();
        self.roster = load.roster;
        match load.error {
            Some(e) => Err(e.into()),
            None => Ok(&self.roster),
        }
    }
}

use super::model::{EditMode, MarksMeta, RosterEntry, SessionKey, SessionKind, SessionRecord};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    NoKey,
    Resolving,
    Absent,
    Existing,
}

/// Tag for an in-flight resolution. Only the ticket issued by the most
/// recent `select` may be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub(super) seq: u64,
    pub(super) key: SessionKey,
}

impl Ticket {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub(super) key: Option<SessionKey>,
    pub(super) mode: EditMode,
    /// Bumped on every key change; responses tagged with an older value are
    /// discarded.
    pub(super) seq: u64,
    pub(super) pending: Option<u64>,
    pub(super) record: Option<SessionRecord>,
    pub(super) roster: Vec<RosterEntry>,
    pub(super) meta: Option<MarksMeta>,
    pub(super) meta_defaults: MarksMeta,
    pub(super) saving: bool,
}

impl SessionState {
    pub fn new(meta_defaults: MarksMeta) -> Self {
        Self {
            key: None,
            mode: EditMode::Edit,
            seq: 0,
            pending: None,
            record: None,
            roster: Vec::new(),
            meta: None,
            meta_defaults,
            saving: false,
        }
    }

    pub fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    pub fn kind(&self) -> Option<SessionKind> {
        self.key.as_ref().map(|k| k.kind)
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.record.as_ref()
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn meta(&self) -> Option<&MarksMeta> {
        self.meta.as_ref()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn phase(&self) -> Phase {
        if self.pending.is_some() {
            return Phase::Resolving;
        }
        match &self.record {
            Some(SessionRecord::Absent { .. }) => Phase::Absent,
            Some(SessionRecord::Existing { .. }) => Phase::Existing,
            None => Phase::NoKey,
        }
    }

    /// Switches to a new key. All edits for the previous key are dropped
    /// without persisting. Returns a ticket when the key is complete and a
    /// resolution must be run; an incomplete key leaves an empty working set.
    pub fn select(&mut self, key: SessionKey, mode: EditMode) -> Option<Ticket> {
        self.seq += 1;
        self.record = None;
        self.pending = None;
        self.meta = None;
        self.mode = mode;
        let complete = key.is_complete();
        self.key = Some(key.clone());
        if !complete {
            tracing::debug!(seq = self.seq, "selection incomplete, nothing to resolve");
            return None;
        }
        self.pending = Some(self.seq);
        tracing::debug!(seq = self.seq, class = %key.class_id, batch = %key.batch_id, "resolution requested");
        Some(Ticket { seq: self.seq, key })
    }

    /// Drops the key entirely (page unmount).
    pub fn clear(&mut self) {
        self.seq += 1;
        self.key = None;
        self.record = None;
        self.pending = None;
        self.meta = None;
        self.roster.clear();
        self.saving = false;
    }

    /// Whether `ticket` still belongs to the active key.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.pending == Some(ticket.seq) && self.key.as_ref() == Some(&ticket.key)
    }

    /// Invalidates the record for the active key and forces re-selection of
    /// the temporal discriminator.
    pub(super) fn reset_discriminator(&mut self) {
        self.seq += 1;
        self.record = None;
        self.pending = None;
        self.meta = None;
        if let Some(key) = self.key.as_mut() {
            key.clear_discriminator();
        }
    }
}

//! Attendance / marks session reconciliation.
//!
//! `SessionState` is the single explicit state for one page: the active key,
//! the resolved record and the roster cache. Resolution, editing and
//! submission are transitions on it; the IPC layer only wires requests to
//! these transitions and renders snapshots.

pub mod editor;
pub mod gate;
pub mod model;
pub mod resolver;
pub mod roster;
mod state;

#[cfg(test)]
pub(crate) mod fake;

pub use state::{Phase, SessionState, Ticket};

use crate::backend::BackendError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIssue {
    pub admission_no: String,
    pub message: String,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// Collaborator unreachable; the detail is logged, not shown.
    #[error("Server unreachable, please try again")]
    Unreachable(String),
    #[error("{} row(s) failed validation", .0.len())]
    Validation(Vec<RowIssue>),
    /// Collaborator refused the request; message is shown verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("no session selected")]
    NoSession,
    #[error("session is read-only")]
    ReadOnly,
    #[error("a save is already in progress")]
    Busy,
    #[error("delete requires confirmation")]
    ConfirmationRequired,
    #[error("{0}")]
    BadInput(String),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Unreachable(_) => "collaborator_unreachable",
            SessionError::Validation(_) => "validation_failed",
            SessionError::Rejected(_) => "rejected",
            SessionError::NoSession => "no_session",
            SessionError::ReadOnly => "read_only",
            SessionError::Busy => "busy",
            SessionError::ConfirmationRequired => "confirmation_required",
            SessionError::BadInput(_) => "bad_params",
        }
    }
}

impl From<BackendError> for SessionError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unreachable(detail) => SessionError::Unreachable(detail),
            BackendError::Rejected(message) => SessionError::Rejected(message),
        }
    }
}

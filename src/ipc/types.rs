use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::session::SessionState;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: SessionState,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let session = SessionState::new(config.marks_defaults());
        Self {
            config,
            workspace: None,
            db: None,
            session,
        }
    }
}

use crate::logging::LogFormat;
use crate::session::model::MarksMeta;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Attendance and marks session daemon. Speaks newline-delimited JSON on
/// stdin/stdout.
#[derive(Debug, Clone, Parser)]
#[command(name = "rollbookd", version, about)]
pub struct Config {
    /// Workspace directory to open at start-up.
    #[arg(long, env = "ROLLBOOKD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Creator identity used when a submission does not name one.
    #[arg(long, env = "ROLLBOOKD_USER", default_value = "admin")]
    pub user: String,

    #[arg(long, env = "ROLLBOOKD_SCHOOL_NAME", default_value = "My School")]
    pub school_name: String,

    #[arg(long, env = "ROLLBOOKD_ACADEMIC_YEAR", default_value = "2024-25")]
    pub academic_year: String,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Append logs to this file instead of stderr.
    #[arg(long, env = "ROLLBOOKD_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn marks_defaults(&self) -> MarksMeta {
        MarksMeta {
            max_mark: None,
            academic_year: self.academic_year.clone(),
            school_name: self.school_name.clone(),
        }
    }
}

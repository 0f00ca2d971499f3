mod backend;
mod config;
mod db;
mod ipc;
mod logging;
mod session;

use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() {
    let config = config::Config::parse();
    if let Err(e) = logging::init_logging(
        logging::level_from_verbosity(config.verbose),
        config.log_format,
        config.log_file.as_deref(),
    ) {
        eprintln!("failed to open log file: {e}");
    }

    let startup_workspace = config.workspace.clone();
    let mut state = ipc::AppState::new(config);
    if let Some(path) = startup_workspace {
        match db::open_db(&path) {
            Ok(conn) => {
                tracing::info!(workspace = %path.display(), "workspace opened");
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => {
                tracing::error!(workspace = %path.display(), error = ?e, "workspace open failed");
            }
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request");
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        tracing::debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}

mod config;
mod db;
mod grading;
mod ipc;
mod report;

use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_logging(cfg: &config::Config) {
    // stdout carries the protocol; logs go to stderr.
    let filter = EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cfg = config::Config::from_env();
    init_logging(&cfg);

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(workspace = %path.display(), error = %e, "could not open startup workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed; shutting down");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // No id to echo back.
                tracing::warn!(error = %e, "malformed request line");
                ipc::err("", "bad_json", e.to_string(), None)
            }
        };
        let _ = writeln!(stdout, "{}", resp);
        let _ = stdout.flush();
    }
}

mod calc;
mod catalog;
mod config;
mod db;
mod error;
mod exchange;
mod ipc;
mod logging;
mod model;
mod performance;
mod profile;
mod roster;
mod subjects;

use std::io::{self, BufRead, Write};

fn main() {
    let (config, warnings) = config::DaemonConfig::from_env();
    for w in &warnings {
        eprintln!("recordsd: {w}; using default");
    }
    if let Some(dir) = &config.log_dir {
        // stdout is the protocol channel; logging problems go to stderr only.
        if let Err(e) = logging::init_logging(config.log_level, &dir.to_string_lossy()) {
            eprintln!("recordsd: logging disabled: {e}");
        }
    }

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
    };
    if let Some(path) = config.workspace.clone() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            eprintln!("recordsd: could not open workspace: {e:#}");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                log::warn!("event=bad_request module=main status=error error={}", e);
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    log::info!("event=daemon_stop module=main status=ok");
    log::logger().flush();
}

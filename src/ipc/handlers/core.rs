use crate::db;
use crate::logging::logging_status;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let logging = logging_status().map(|(level, dir)| {
        json!({ "level": level, "logDir": dir.to_string_lossy() })
    });
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "logging": logging,
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, path.clone()) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

/// Opens (creating if needed) the workspace database and makes it current.
/// The previous workspace stays selected when opening fails.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    match db::open_db(&path) {
        Ok(conn) => {
            log::info!(
                "event=workspace_open module=ipc status=ok path={}",
                path.display()
            );
            state.db = Some(conn);
            state.workspace = Some(path);
            Ok(())
        }
        Err(e) => {
            log::error!(
                "event=workspace_open module=ipc status=error path={} error={:#}",
                path.display(),
                e
            );
            Err(e)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}

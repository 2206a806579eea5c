use crate::db;
use crate::error::RecordsError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{bool_param, require_db, required_str, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn batch_name(params: &serde_json::Value, key: &str) -> HandlerResult<String> {
    let name = required_str(params, key)?.trim();
    if name.is_empty() {
        return Err(RecordsError::InvalidInput("batch name cannot be empty".to_string()).into());
    }
    Ok(name.to_string())
}

fn require_batch(conn: &Connection, name: &str) -> HandlerResult<()> {
    if !db::batch_exists(conn, name).map_err(HandlerErr::query)? {
        return Err(RecordsError::NotFound(format!("batch not found: {name}")).into());
    }
    Ok(())
}

fn batch_list(conn: &Connection) -> HandlerResult {
    let batches = db::list_batches(conn).map_err(HandlerErr::query)?;
    Ok(json!({ "batches": batches }))
}

fn handle_batches_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "batches": [] }));
    };
    respond(req, batch_list(conn))
}

fn batches_create(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let name = batch_name(params, "name")?;
    if db::batch_exists(conn, &name).map_err(HandlerErr::query)? {
        return Err(RecordsError::InvalidInput(format!("batch {name} already exists")).into());
    }
    db::create_batch(conn, &name).map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    log::info!("event=batch_create module=ipc status=ok batch={}", name);
    batch_list(conn)
}

fn batches_rename(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let old = batch_name(params, "oldName")?;
    let new = batch_name(params, "newName")?;
    require_batch(conn, &old)?;
    if old == new {
        return batch_list(conn);
    }
    if db::batch_exists(conn, &new).map_err(HandlerErr::query)? {
        return Err(RecordsError::InvalidInput(format!("batch {new} already exists")).into());
    }
    db::write_tx(conn, |tx| db::rename_batch(tx, &old, &new)).map_err(HandlerErr::tx)?;
    log::info!(
        "event=batch_rename module=ipc status=ok from={} to={}",
        old,
        new
    );
    batch_list(conn)
}

fn batches_delete(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let name = batch_name(params, "name")?;
    require_batch(conn, &name)?;
    let students = db::batch_student_count(conn, &name).map_err(HandlerErr::query)?;
    if students > 0 && !bool_param(params, "confirmDataLoss") {
        return Err(RecordsError::ConfirmationRequired {
            message: format!(
                "deleting batch {name} permanently removes {students} student record(s)"
            ),
            details: json!({ "studentCount": students }),
        }
        .into());
    }
    db::write_tx(conn, |tx| db::delete_batch(tx, &name)).map_err(HandlerErr::tx)?;
    log::info!(
        "event=batch_delete module=ipc status=ok batch={} students_removed={}",
        name,
        students
    );
    batch_list(conn)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "batches.list" => Some(handle_batches_list(state, req)),
        "batches.create" => Some(respond(req, batches_create(state, &req.params))),
        "batches.rename" => Some(respond(req, batches_rename(state, &req.params))),
        "batches.delete" => Some(respond(req, batches_delete(state, &req.params))),
        _ => None,
    }
}

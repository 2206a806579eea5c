use crate::catalog::Department;
use crate::db::{self, RosterStore};
use crate::ipc::helpers::{
    bool_param, department_semester, load_subjects, parse_param, require_db, required_str,
    respond, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Subject;
use crate::roster::apply_new_subject_list;
use crate::subjects::{add_subject, check_removals_confirmed, normalize_subject_list, remove_subject};
use rusqlite::Connection;
use serde_json::json;

fn subjects_list(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let (department, semester) = department_semester(params)?;
    let subjects = load_subjects(conn, department, semester)?;
    Ok(json!({ "subjects": subjects }))
}

/// Saves a new subject list and reconciles every batch roster of the
/// department for that semester, all in one transaction.
fn save_subject_list(
    conn: &Connection,
    department: &Department,
    semester: u8,
    new_list: &[Subject],
    confirmed: bool,
) -> HandlerResult {
    let new_list = normalize_subject_list(new_list)?;
    let old_list = load_subjects(conn, department, semester)?;
    let removed = check_removals_confirmed(&old_list, &new_list, confirmed)?;

    let batches = conn
        .roster_batches(department.id)
        .map_err(HandlerErr::query)?;
    let mut rosters = Vec::with_capacity(batches.len());
    for batch in batches {
        let students = conn
            .fetch_roster(&batch, department.id)
            .map_err(HandlerErr::query)?;
        rosters.push((batch, apply_new_subject_list(&students, semester, &new_list)));
    }

    db::write_tx(conn, |tx| -> anyhow::Result<()> {
        tx.persist_subjects(department.id, semester, &new_list)?;
        for (batch, students) in &rosters {
            tx.persist_roster(batch, department.id, students)?;
        }
        Ok(())
    })
    .map_err(HandlerErr::tx)?;

    log::info!(
        "event=subjects_save module=ipc status=ok department={} semester={} subjects={} removed={} rosters={}",
        department.id,
        semester,
        new_list.len(),
        removed.len(),
        rosters.len()
    );
    Ok(json!({
        "subjects": new_list,
        "removedSubjects": removed,
        "rostersUpdated": rosters.len(),
    }))
}

fn subjects_update(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let (department, semester) = department_semester(params)?;
    let list: Vec<Subject> = parse_param(params, "subjects")?;
    save_subject_list(
        conn,
        department,
        semester,
        &list,
        bool_param(params, "confirmDataLoss"),
    )
}

fn subjects_add(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let (department, semester) = department_semester(params)?;
    let subject: Subject = parse_param(params, "subject")?;
    let current = load_subjects(conn, department, semester)?;
    let list = add_subject(&current, &subject)?;
    save_subject_list(conn, department, semester, &list, false)
}

fn subjects_remove(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let (department, semester) = department_semester(params)?;
    let name = required_str(params, "name")?;
    let current = load_subjects(conn, department, semester)?;
    let list = remove_subject(&current, name)?;
    save_subject_list(
        conn,
        department,
        semester,
        &list,
        bool_param(params, "confirmDataLoss"),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.list" => subjects_list(state, &req.params),
        "subjects.update" => subjects_update(state, &req.params),
        "subjects.add" => subjects_add(state, &req.params),
        "subjects.remove" => subjects_remove(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}

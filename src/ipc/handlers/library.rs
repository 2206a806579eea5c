use crate::ipc::helpers::{
    edit_profile, load_roster, require_db, required_str, respond, roster_key, str_param,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::profile::{add_library_record, books_due, delete_library_record, today, toggle_return};
use crate::roster::find_student;
use serde_json::json;

/// One student's records, or a per-student summary of the whole roster.
fn library_list(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let key = roster_key(params)?;
    let students = load_roster(conn, &key)?;

    if let Some(id) = str_param(params, "studentId") {
        let student = find_student(&students, id)?;
        return Ok(json!({
            "studentId": student.id,
            "records": student.library,
            "booksDue": books_due(student),
        }));
    }

    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            json!({
                "studentId": s.id,
                "name": s.name,
                "enrollmentNo": s.enrollment_no,
                "booksDue": books_due(s),
                "records": s.library,
            })
        })
        .collect();
    Ok(json!({ "students": rows }))
}

fn library_add(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let key = roster_key(params)?;
    let id = required_str(params, "studentId")?;
    let book_name = str_param(params, "bookName").unwrap_or("");
    let book_code = str_param(params, "bookCode").unwrap_or("");
    let issue_date = str_param(params, "issueDate")
        .filter(|d| !d.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(today);

    let (record, student) = edit_profile(conn, &key, id, |p| {
        add_library_record(p, book_name, book_code, &issue_date)
    })?;
    log::info!(
        "event=library_issue module=ipc status=ok batch={} department={} id={} record={}",
        key.batch,
        key.department.id,
        id,
        record.id
    );
    Ok(json!({ "record": record, "booksDue": books_due(&student) }))
}

fn library_toggle_return(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let key = roster_key(params)?;
    let id = required_str(params, "studentId")?;
    let record_id = required_str(params, "recordId")?;
    let today = today();
    let (record, student) =
        edit_profile(conn, &key, id, |p| toggle_return(p, record_id, &today))?;
    Ok(json!({ "record": record, "booksDue": books_due(&student) }))
}

fn library_delete(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let key = roster_key(params)?;
    let id = required_str(params, "studentId")?;
    let record_id = required_str(params, "recordId")?;
    let ((), student) = edit_profile(conn, &key, id, |p| delete_library_record(p, record_id))?;
    Ok(json!({ "deleted": record_id, "booksDue": books_due(&student) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "library.list" => library_list(state, &req.params),
        "library.add" => library_add(state, &req.params),
        "library.toggleReturn" => library_toggle_return(state, &req.params),
        "library.delete" => library_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}

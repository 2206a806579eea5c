use crate::exchange::{export_results_csv, parse_roster_csv};
use crate::ipc::helpers::{
    load_roster, load_subjects, require_db, respond, save_roster, selection, str_param,
    view_param, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::performance::{build_performance_data, result_rows, select_view};
use crate::roster::import_roster;
use serde_json::json;

/// CSV text comes inline as `csv` or from a file at `path`.
fn csv_source(params: &serde_json::Value) -> HandlerResult<String> {
    if let Some(text) = str_param(params, "csv") {
        return Ok(text.to_string());
    }
    let Some(path) = str_param(params, "path").filter(|p| !p.trim().is_empty()) else {
        return Err(HandlerErr::bad_params("missing csv or path"));
    };
    std::fs::read_to_string(path).map_err(|e| HandlerErr::io(e, path))
}

fn students_import_csv(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let sel = selection(params)?;
    let key = sel.roster_key();
    let text = csv_source(params)?;
    let subjects = load_subjects(conn, sel.department, sel.semester)?;

    let parsed = parse_roster_csv(&text, &subjects)?;
    let existing = load_roster(conn, &key)?;
    let outcome = import_roster(&existing, &parsed.rows, Some(&sel), subjects.len())?;
    save_roster(conn, &key, &outcome.students)?;

    log::info!(
        "event=roster_import module=ipc status=ok batch={} department={} semester={} rows={} created={} updated={} skipped={}",
        key.batch,
        key.department.id,
        sel.semester,
        parsed.rows.len(),
        outcome.created,
        outcome.updated,
        parsed.diagnostics.len() + outcome.skipped
    );
    Ok(json!({
        "rowsTotal": parsed.rows.len() + parsed.diagnostics.len(),
        "created": outcome.created,
        "updated": outcome.updated,
        "skipped": parsed.diagnostics.len() + outcome.skipped,
        "warnings": parsed.diagnostics,
        "studentCount": outcome.students.len(),
    }))
}

fn students_export_csv(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let sel = selection(params)?;
    let key = sel.roster_key();
    let view = view_param(params)?;

    let subjects = load_subjects(conn, sel.department, sel.semester)?;
    let students = load_roster(conn, &key)?;
    let data = select_view(
        build_performance_data(&students, sel.semester, &subjects),
        view,
    );
    let rows = result_rows(&data, sel.semester);
    let csv = export_results_csv(&rows);

    let Some(out_path) = str_param(params, "outPath").filter(|p| !p.trim().is_empty()) else {
        return Ok(json!({ "csv": csv, "rowsExported": rows.len() }));
    };
    std::fs::write(out_path, &csv).map_err(|e| HandlerErr::io(e, out_path))?;
    log::info!(
        "event=results_export module=ipc status=ok batch={} department={} semester={} rows={}",
        key.batch,
        key.department.id,
        sel.semester,
        rows.len()
    );
    Ok(json!({ "path": out_path, "rowsExported": rows.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.importCsv" => students_import_csv(state, &req.params),
        "students.exportCsv" => students_export_csv(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}

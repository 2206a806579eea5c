use crate::ipc::helpers::{
    load_roster, load_subjects, require_db, respond, selection, view_param, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::performance::{build_performance_data, select_view};

fn performance_get(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let sel = selection(params)?;
    let view = view_param(params)?;
    let subjects = load_subjects(conn, sel.department, sel.semester)?;
    let students = load_roster(conn, &sel.roster_key())?;
    let data = select_view(
        build_performance_data(&students, sel.semester, &subjects),
        view,
    );
    serde_json::to_value(data).map_err(|e| HandlerErr::new("encode_failed", e.to_string()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "performance.get" => Some(respond(req, performance_get(state, &req.params))),
        _ => None,
    }
}

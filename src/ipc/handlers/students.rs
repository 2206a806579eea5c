use crate::ipc::helpers::{
    load_roster, load_subjects, optional_number, parse_param, require_db, required_str, respond,
    roster_key, save_roster, selection, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{semester_from_value, ManualAggregate, MarkComponent, NewStudent};
use crate::roster::{
    add_student, delete_student, find_student, set_mark, set_re_exam, update_student_semester,
    zeroed_marks,
};
use serde_json::json;

fn component_param(params: &serde_json::Value) -> HandlerResult<MarkComponent> {
    let raw = required_str(params, "component")?;
    MarkComponent::parse(raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown mark component: {raw}")))
}

fn students_list(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let key = roster_key(params)?;
    let students = load_roster(conn, &key)?;
    Ok(json!({ "students": students }))
}

fn students_create(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let sel = selection(params)?;
    let key = sel.roster_key();
    let subjects = load_subjects(conn, sel.department, sel.semester)?;
    let mut candidate: NewStudent = parse_param(params, "student")?;
    if candidate.marks.is_empty() {
        candidate.marks = zeroed_marks(&subjects);
    }

    let students = load_roster(conn, &key)?;
    let students = add_student(&students, &candidate, sel.semester, subjects.len())?;
    save_roster(conn, &key, &students)?;

    let created = students.last().cloned();
    if let Some(s) = &created {
        log::info!(
            "event=student_create module=ipc status=ok batch={} department={} id={}",
            key.batch,
            key.department.id,
            s.id
        );
    }
    Ok(json!({ "student": created }))
}

fn students_update(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let sel = selection(params)?;
    let key = sel.roster_key();
    let id = required_str(params, "studentId")?;
    let marks = params
        .get("marks")
        .cloned()
        .and_then(semester_from_value)
        .ok_or_else(|| HandlerErr::bad_params("marks must be an array"))?;
    let manual = ManualAggregate {
        sgpa: optional_number(params, "sgpa")?,
        cgpa: optional_number(params, "cgpa")?,
    };

    let students = load_roster(conn, &key)?;
    let students = update_student_semester(&students, id, sel.semester, &marks, manual)?;
    save_roster(conn, &key, &students)?;
    let student = find_student(&students, id)?;
    Ok(json!({ "student": student }))
}

fn students_delete(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let key = roster_key(params)?;
    let id = required_str(params, "studentId")?;
    let students = load_roster(conn, &key)?;
    let students = delete_student(&students, id)?;
    save_roster(conn, &key, &students)?;
    log::info!(
        "event=student_delete module=ipc status=ok batch={} department={} id={}",
        key.batch,
        key.department.id,
        id
    );
    Ok(json!({ "deleted": id, "remaining": students.len() }))
}

fn students_set_mark(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let sel = selection(params)?;
    let key = sel.roster_key();
    let id = required_str(params, "studentId")?;
    let subject = required_str(params, "subjectName")?;
    let component = component_param(params)?;
    let value = optional_number(params, "value")?.unwrap_or(0.0);

    let students = load_roster(conn, &key)?;
    let students = set_mark(&students, id, sel.semester, subject, component, value)?;
    save_roster(conn, &key, &students)?;
    let marks = find_student(&students, id)?.semester_marks(sel.semester);
    Ok(json!({ "marks": marks }))
}

fn students_set_re_exam(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let sel = selection(params)?;
    let key = sel.roster_key();
    let id = required_str(params, "studentId")?;
    let subject = required_str(params, "subjectName")?;
    let component = component_param(params)?;
    let value = optional_number(params, "value")?;

    let students = load_roster(conn, &key)?;
    let students = set_re_exam(&students, id, sel.semester, subject, component, value)?;
    save_roster(conn, &key, &students)?;
    let marks = find_student(&students, id)?.semester_marks(sel.semester);
    Ok(json!({ "marks": marks }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.create" => students_create(state, &req.params),
        "students.update" => students_update(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        "students.setMark" => students_set_mark(state, &req.params),
        "students.setReExam" => students_set_re_exam(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}

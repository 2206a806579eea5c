use crate::error::RecordsError;
use crate::ipc::helpers::{
    edit_profile, load_roster, optional_number, parse_param, require_db, required_str, respond,
    roster_key, semester_param, str_param, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Accounts, FullStudentProfile, SubjectGrade};
use crate::profile::{
    add_activity, apply_replacement, remove_activity, set_accounts, set_manual_aggregate,
    set_session, set_subject_grade, student_report, ActivityKind, AggregateField,
};
use crate::roster::find_student;
use serde_json::json;

fn profile_get(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let key = roster_key(params)?;
    let id = required_str(params, "studentId")?;
    let students = load_roster(conn, &key)?;
    let student = find_student(&students, id)?;
    Ok(json!({ "student": student }))
}

fn profile_report(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let key = roster_key(params)?;
    let id = required_str(params, "studentId")?;
    let students = load_roster(conn, &key)?;
    let report = student_report(find_student(&students, id)?);
    Ok(json!({ "report": report }))
}

/// `null` or "" clears the grade; anything else must be a known letter.
fn grade_param(params: &serde_json::Value) -> HandlerResult<Option<SubjectGrade>> {
    match str_param(params, "grade").map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => SubjectGrade::parse(raw)
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown grade: {raw}"))),
    }
}

type ProfileEdit = Box<dyn FnOnce(&mut FullStudentProfile) -> Result<(), RecordsError>>;

/// Turns the `op` of a `profile.update` request into a profile edit. All
/// parameters are validated before anything is loaded.
fn profile_edit(params: &serde_json::Value) -> HandlerResult<ProfileEdit> {
    let op = required_str(params, "op")?;
    let edit: ProfileEdit = match op {
        "addActivity" => {
            let kind: ActivityKind = parse_param(params, "kind")?;
            let value = required_str(params, "value")?.to_string();
            Box::new(move |p: &mut FullStudentProfile| {
                add_activity(p, kind, &value).map(|_| ())
            })
        }
        "removeActivity" => {
            let kind: ActivityKind = parse_param(params, "kind")?;
            let value = required_str(params, "value")?.to_string();
            Box::new(move |p: &mut FullStudentProfile| {
                remove_activity(p, kind, &value);
                Ok(())
            })
        }
        "setAccounts" => {
            let accounts: Accounts = parse_param(params, "accounts")?;
            Box::new(move |p: &mut FullStudentProfile| {
                set_accounts(p, accounts);
                Ok(())
            })
        }
        "setSession" => {
            let semester = semester_param(params)?;
            let session = str_param(params, "session").unwrap_or("").to_string();
            Box::new(move |p: &mut FullStudentProfile| {
                set_session(p, semester, &session);
                Ok(())
            })
        }
        "setManualAggregate" => {
            let semester = semester_param(params)?;
            let field: AggregateField = parse_param(params, "field")?;
            let value = optional_number(params, "value")?;
            Box::new(move |p: &mut FullStudentProfile| {
                set_manual_aggregate(p, semester, field, value)
            })
        }
        "setSubjectGrade" => {
            let semester = semester_param(params)?;
            let subject = required_str(params, "subjectName")?.to_string();
            let grade = grade_param(params)?;
            Box::new(move |p: &mut FullStudentProfile| {
                set_subject_grade(p, semester, &subject, grade)
            })
        }
        "replace" => {
            let replacement: FullStudentProfile = parse_param(params, "profile")?;
            Box::new(move |p: &mut FullStudentProfile| apply_replacement(p, replacement))
        }
        other => return Err(HandlerErr::bad_params(format!("unknown op: {other}"))),
    };
    Ok(edit)
}

fn profile_update(state: &AppState, params: &serde_json::Value) -> HandlerResult {
    let conn = require_db(state)?;
    let key = roster_key(params)?;
    let id = required_str(params, "studentId")?;
    let edit = profile_edit(params)?;
    let ((), student) = edit_profile(conn, &key, id, edit)?;
    log::info!(
        "event=profile_update module=ipc status=ok batch={} department={} id={} op={}",
        key.batch,
        key.department.id,
        id,
        str_param(params, "op").unwrap_or("")
    );
    Ok(json!({ "student": student }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "profile.get" => profile_get(state, &req.params),
        "profile.update" => profile_update(state, &req.params),
        "profile.report" => profile_report(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}

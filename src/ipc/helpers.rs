use crate::catalog::{academic_department, Department, RosterKey, Selection};
use crate::db::{self, RosterStore};
use crate::error::RecordsError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{is_valid_semester, FullStudentProfile, Subject};
use crate::performance::PerformanceView;
use crate::roster::{find_student, replace_profile};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

pub type HandlerResult<T = serde_json::Value> = Result<T, HandlerErr>;

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn query(e: impl std::fmt::Display) -> Self {
        Self::new("db_query_failed", e.to_string())
    }

    pub fn tx(e: anyhow::Error) -> Self {
        Self::new("db_tx_failed", format!("{e:#}"))
    }

    pub fn io(e: impl std::fmt::Display, path: &str) -> Self {
        Self {
            code: "io_failed",
            message: e.to_string(),
            details: Some(json!({ "path": path })),
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<RecordsError> for HandlerErr {
    fn from(e: RecordsError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}

/// Wraps a handler outcome in the response envelope and logs failures.
pub fn respond(req: &Request, result: HandlerResult) -> serde_json::Value {
    match result {
        Ok(v) => {
            log::debug!(
                "event=ipc_request module=ipc status=ok method={}",
                req.method
            );
            ok(&req.id, v)
        }
        Err(e) => {
            log::warn!(
                "event=ipc_request module=ipc status=error method={} code={}",
                req.method,
                e.code
            );
            e.response(&req.id)
        }
    }
}

pub fn require_db(state: &AppState) -> HandlerResult<&Connection> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn str_param<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub fn required_str<'a>(params: &'a serde_json::Value, key: &str) -> HandlerResult<&'a str> {
    str_param(params, key).ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn bool_param(params: &serde_json::Value, key: &str) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Decodes `params[key]`; absent or null keys are `bad_params`.
pub fn parse_param<T: DeserializeOwned>(params: &serde_json::Value, key: &str) -> HandlerResult<T> {
    let raw = params
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid {key}: {e}")))
}

/// A number or null; null clears the value. Non-numbers are `bad_params`.
pub fn optional_number(params: &serde_json::Value, key: &str) -> HandlerResult<Option<f64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{key} must be a number or null"))),
    }
}

/// `all` (default) or `failed`.
pub fn view_param(params: &serde_json::Value) -> HandlerResult<PerformanceView> {
    match params.get("view") {
        None | Some(serde_json::Value::Null) => Ok(PerformanceView::All),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|_| HandlerErr::bad_params("view must be all or failed")),
    }
}

pub fn selection(params: &serde_json::Value) -> HandlerResult<Selection> {
    Ok(Selection::resolve(
        str_param(params, "batch"),
        str_param(params, "department"),
        params.get("semester").and_then(|v| v.as_i64()),
    )?)
}

pub fn roster_key(params: &serde_json::Value) -> HandlerResult<RosterKey> {
    Ok(RosterKey::resolve(
        str_param(params, "batch"),
        str_param(params, "department"),
    )?)
}

pub fn semester_param(params: &serde_json::Value) -> HandlerResult<u8> {
    let Some(raw) = params.get("semester").and_then(|v| v.as_i64()) else {
        return Err(RecordsError::MissingSelection("select a semester first".to_string()).into());
    };
    u8::try_from(raw)
        .ok()
        .filter(|s| is_valid_semester(*s))
        .ok_or_else(|| {
            RecordsError::InvalidInput(format!("semester must be 1..8, got {raw}")).into()
        })
}

/// Department and semester for subject-list requests (no batch involved).
pub fn department_semester(
    params: &serde_json::Value,
) -> HandlerResult<(&'static Department, u8)> {
    let Some(department) = str_param(params, "department").filter(|d| !d.trim().is_empty())
    else {
        return Err(RecordsError::MissingSelection("select a department first".to_string()).into());
    };
    let department = academic_department(department)?;
    Ok((department, semester_param(params)?))
}

pub fn load_roster(conn: &Connection, key: &RosterKey) -> HandlerResult<Vec<FullStudentProfile>> {
    conn.fetch_roster(&key.batch, key.department.id)
        .map_err(HandlerErr::query)
}

pub fn load_subjects(
    conn: &Connection,
    department: &Department,
    semester: u8,
) -> HandlerResult<Vec<Subject>> {
    conn.fetch_subjects(department.id, semester)
        .map_err(HandlerErr::query)
}

pub fn save_roster(
    conn: &Connection,
    key: &RosterKey,
    students: &[FullStudentProfile],
) -> HandlerResult<()> {
    db::write_tx(conn, |tx| {
        tx.persist_roster(&key.batch, key.department.id, students)
    })
    .map_err(HandlerErr::tx)
}

/// Loads the roster, applies `edit` to one student's profile and persists the
/// result. Returns the edit's value and the updated profile.
pub fn edit_profile<T, F>(
    conn: &Connection,
    key: &RosterKey,
    student_id: &str,
    edit: F,
) -> HandlerResult<(T, FullStudentProfile)>
where
    F: FnOnce(&mut FullStudentProfile) -> Result<T, RecordsError>,
{
    let students = load_roster(conn, key)?;
    let mut profile = find_student(&students, student_id)?.clone();
    let out = edit(&mut profile)?;
    let students = replace_profile(&students, profile.clone())?;
    save_roster(conn, key, &students)?;
    Ok((out, profile))
}

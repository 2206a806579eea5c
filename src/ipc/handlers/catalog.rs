use crate::catalog::{DEPARTMENTS, YEARS};
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_catalog_get(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "departments": DEPARTMENTS,
            "years": YEARS,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "catalog.get" => Some(handle_catalog_get(state, req)),
        _ => None,
    }
}

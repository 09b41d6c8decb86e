use crate::ipc::error::{err, ok, respond, HandlerErr};
use crate::ipc::helpers::{optional_bool, required_str, store_ref, today};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "mode": state.mode(),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "revision": state.store.as_ref().map(|s| s.revision()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(&req.params, "path") {
        Ok(v) => PathBuf::from(v),
        Err(_) => return err(&req.id, "bad_params", "missing params.path", None),
    };

    match state.open_workspace(&path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "mode": state.mode(),
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

fn demo_start(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let today = today(params)?;
    let seeded = optional_bool(params, "seeded")?.unwrap_or(true);
    state.start_demo(today, seeded);
    let store = store_ref(state)?;
    Ok(json!({
        "mode": store.mode(),
        "today": today.to_string(),
        "students": store.list_students()?.len(),
        "revision": store.revision(),
    }))
}

fn demo_reset(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    if !state.is_demo() {
        return Err(HandlerErr::new("not_demo", "demo mode is not active"));
    }
    demo_start(state, params)
}

fn sync_revision(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let store = store_ref(state)?;
    Ok(json!({
        "mode": store.mode(),
        "revision": store.revision(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "demo.start" => Some(respond(&req.id, demo_start(state, &req.params))),
        "demo.reset" => Some(respond(&req.id, demo_reset(state, &req.params))),
        "sync.revision" => Some(respond(&req.id, sync_revision(state))),
        _ => None,
    }
}

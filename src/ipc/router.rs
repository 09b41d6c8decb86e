use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use serde_json::json;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    let resp = dispatch(state, &req);

    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = resp["error"]["code"].as_str().unwrap_or("unknown").to_string();
        let message = resp["error"]["message"].as_str().unwrap_or("").to_string();
        tracing::warn!(id = %req.id, method = %req.method, %code, %message, "request failed");
        if state.is_demo() {
            return with_signup_prompt(resp);
        }
    }
    resp
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::profile::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::schedules::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::sessions::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::stats::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::calendar::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::exports::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::backup::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

/// Demo mode never shows a raw failure; the UI turns this flag into the
/// sign-up dialog.
fn with_signup_prompt(mut resp: serde_json::Value) -> serde_json::Value {
    let error = &mut resp["error"];
    if !error["details"].is_object() {
        error["details"] = json!({});
    }
    error["details"]["signupPrompt"] = json!(true);
    error["details"]["demo"] = json!(true);
    resp
}

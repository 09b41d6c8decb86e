use crate::backup;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use serde_json::{json, Value};
use std::path::PathBuf;

fn workspace_path(state: &AppState) -> Result<PathBuf, HandlerErr> {
    if state.is_demo() {
        return Err(HandlerErr::new(
            "backup_failed",
            "backups are only available for a workspace",
        ));
    }
    state
        .workspace
        .clone()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn backup_export(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let workspace = workspace_path(state)?;
    let out_path = required_str(params, "outPath")?;
    let summary = backup::export_workspace_bundle(&workspace, &PathBuf::from(&out_path))
        .map_err(|e| {
            HandlerErr::new("backup_failed", format!("{e:#}"))
                .with_details(json!({ "path": out_path }))
        })?;
    tracing::info!(path = %out_path, sha256 = %summary.db_sha256, "workspace bundle exported");
    Ok(json!({
        "ok": true,
        "outPath": out_path,
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "dbSha256": summary.db_sha256,
    }))
}

fn backup_import(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let workspace = workspace_path(state)?;
    let in_path = required_str(params, "inPath")?;
    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr::new("not_found", "bundle file not found")
            .with_details(json!({ "path": in_path })));
    }

    // Drop the open connection before replacing the database file.
    state.close();
    let imported = backup::import_workspace_bundle(&src, &workspace);
    let reopened = state.open_workspace(&workspace);

    let summary = imported.map_err(|e| {
        HandlerErr::new("backup_failed", format!("{e:#}")).with_details(json!({ "path": in_path }))
    })?;
    reopened.map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
    tracing::info!(path = %in_path, format = %summary.bundle_format_detected, "workspace bundle imported");

    Ok(json!({
        "ok": true,
        "workspacePath": workspace.to_string_lossy(),
        "bundleFormatDetected": summary.bundle_format_detected,
        "dbSha256": summary.db_sha256,
        "revision": state.store.as_ref().map(|s| s.revision()),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspace" => backup_export(state, &req.params),
        "backup.importWorkspace" => backup_import(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

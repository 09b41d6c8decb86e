use crate::export::{invoice_html, sessions_csv, sessions_csv_filename, Invoice};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    optional_bool, optional_date, optional_str, parse_range, required_str, store_ref, to_value,
    today,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{SessionFilter, Store};
use serde_json::{json, Value};
use std::path::PathBuf;

fn write_text_file(path: &str, contents: &str) -> Result<(), HandlerErr> {
    let out = PathBuf::from(path);
    let failed = |e: std::io::Error| {
        HandlerErr::new("export_failed", e.to_string()).with_details(json!({ "path": path }))
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(failed)?;
    }
    std::fs::write(&out, contents).map_err(failed)?;
    Ok(())
}

fn exports_sessions_csv(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let range = parse_range(params)?;
    let sessions = store.list_sessions(&SessionFilter {
        range,
        student_id: optional_str(params, "studentId")?,
    })?;
    let csv = sessions_csv(&sessions);
    let out_path = optional_str(params, "outPath")?;
    if let Some(path) = out_path.as_deref() {
        write_text_file(path, &csv)?;
        tracing::info!(path, rows = sessions.len(), "sessions csv written");
    }
    Ok(json!({
        "filename": sessions_csv_filename(&range),
        "csv": csv,
        "rowsExported": sessions.len(),
        "outPath": out_path,
    }))
}

fn exports_invoice_html(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let student = store.get_student(&required_str(params, "studentId")?)?;
    let period = parse_range(params)?;
    let issue_date = match optional_date(params, "issueDate")? {
        Some(d) => d,
        None => today(params)?,
    };
    let number = match optional_str(params, "invoiceNumber")? {
        Some(n) => n,
        None => default_invoice_number(issue_date, &student.id),
    };
    let sessions = store.list_sessions(&SessionFilter {
        range: period,
        student_id: Some(student.id.clone()),
    })?;

    let mut invoice = Invoice::build(
        number,
        issue_date,
        store.profile()?,
        student,
        &sessions,
        period,
        optional_bool(params, "unpaidOnly")?.unwrap_or(false),
    );
    invoice.due_date = optional_date(params, "dueDate")?;
    invoice.notes = optional_str(params, "notes")?;

    let html = invoice_html(&invoice)
        .map_err(|e| HandlerErr::new("export_failed", format!("invoice render failed: {e}")))?;
    let out_path = optional_str(params, "outPath")?;
    if let Some(path) = out_path.as_deref() {
        write_text_file(path, &html)?;
        tracing::info!(path, invoice = %invoice.number, "invoice written");
    }
    Ok(json!({
        "invoiceNumber": invoice.number,
        "html": html,
        "total": invoice.total(),
        "amountDue": invoice.amount_due(),
        "lines": to_value(&invoice.lines)?,
        "outPath": out_path,
    }))
}

fn default_invoice_number(issue_date: chrono::NaiveDate, student_id: &str) -> String {
    let suffix: String = student_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("INV-{}-{}", issue_date.format("%Y%m%d"), suffix)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "exports.sessionsCsv" => store_ref(state).and_then(|s| exports_sessions_csv(s, &req.params)),
        "exports.invoiceHtml" => store_ref(state).and_then(|s| exports_invoice_html(s, &req.params)),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn default_invoice_number_uses_date_and_id_prefix() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).expect("date");
        assert_eq!(
            default_invoice_number(date, "a1-b2c3-d4"),
            "INV-20240201-A1B2"
        );
    }
}

use crate::calendar::{build_month_grid, build_week, entries_by_date};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    optional_bool, optional_date, optional_i64, optional_str, store_ref, to_value, today,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{week_start, DateRange, ScheduledClass};
use crate::store::{SessionFilter, Store};
use chrono::{Datelike, Duration};
use serde_json::{json, Value};

fn projected_schedules(
    store: &dyn Store,
    params: &Value,
    student_id: Option<&str>,
) -> Result<Vec<ScheduledClass>, HandlerErr> {
    if !optional_bool(params, "includeScheduled")?.unwrap_or(true) {
        return Ok(Vec::new());
    }
    Ok(store
        .list_schedules()?
        .into_iter()
        .filter(|c| c.is_active)
        .filter(|c| student_id.map_or(true, |id| c.student_id == id))
        .collect())
}

fn calendar_month(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let today = today(params)?;
    let year = optional_i64(params, "year")?.unwrap_or(today.year() as i64);
    let month = optional_i64(params, "month")?.unwrap_or(today.month() as i64);
    let (year, month) = match (i32::try_from(year), u32::try_from(month)) {
        (Ok(y), Ok(m)) if (1..=12).contains(&m) => (y, m),
        _ => {
            return Err(HandlerErr::bad_params("month must be between 1 and 12")
                .with_details(json!({ "year": year, "month": month })))
        }
    };
    let range = DateRange::month(year, month)
        .ok_or_else(|| HandlerErr::bad_params("year is out of range"))?;

    let student_id = optional_str(params, "studentId")?;
    let sessions = store.list_sessions(&SessionFilter {
        range,
        student_id: student_id.clone(),
    })?;
    let schedules = projected_schedules(store, params, student_id.as_deref())?;
    let entries = entries_by_date(&sessions, &schedules, &range);
    let grid = build_month_grid(year, month, &entries, Some(today))
        .ok_or_else(|| HandlerErr::bad_params("year is out of range"))?;
    Ok(json!({ "month": to_value(&grid)? }))
}

fn calendar_week(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let today = today(params)?;
    let date = optional_date(params, "date")?.unwrap_or(today);
    let start = week_start(date);
    let range = DateRange::between(start, start + Duration::days(6));

    let student_id = optional_str(params, "studentId")?;
    let sessions = store.list_sessions(&SessionFilter {
        range,
        student_id: student_id.clone(),
    })?;
    let schedules = projected_schedules(store, params, student_id.as_deref())?;
    let entries = entries_by_date(&sessions, &schedules, &range);
    Ok(json!({ "week": to_value(&build_week(date, &entries, Some(today)))? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "calendar.month" => store_ref(state).and_then(|s| calendar_month(s, &req.params)),
        "calendar.week" => store_ref(state).and_then(|s| calendar_week(s, &req.params)),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

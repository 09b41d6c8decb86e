use crate::calc;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{optional_str, parse_range, store_ref, to_value, today};
use crate::ipc::types::{AppState, Request};
use crate::model::{DateRange, Session};
use crate::store::{SessionFilter, Store};
use serde_json::{json, Value};

/// Every stats method reads the same slice: an optional student filter plus
/// a range resolved from `startDate`/`endDate` or a `period` preset.
fn load(store: &dyn Store, params: &Value) -> Result<(Vec<Session>, DateRange), HandlerErr> {
    let range = parse_range(params)?;
    let sessions = store.list_sessions(&SessionFilter {
        range,
        student_id: optional_str(params, "studentId")?,
    })?;
    Ok((sessions, range))
}

fn stats_overview(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let today = today(params)?;
    let sessions = store.list_sessions(&SessionFilter::default())?;
    let students = store.list_students()?;
    let overview = calc::overview(&sessions, &students, today);
    Ok(json!({ "overview": to_value(&overview)? }))
}

fn stats_revenue_by_month(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let (sessions, range) = load(store, params)?;
    Ok(json!({ "months": to_value(&calc::revenue_by_month(&sessions, &range))? }))
}

fn stats_weekly_hours(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let (sessions, range) = load(store, params)?;
    if let Some((start, end)) = calc::weekly_span(&sessions, &range) {
        if (end - start).num_days() > calc::MAX_WEEKLY_SPAN_DAYS {
            return Err(HandlerErr::bad_params("weekly hours cover at most ten years")
                .with_details(json!({
                    "startDate": start.to_string(),
                    "endDate": end.to_string(),
                    "maxDays": calc::MAX_WEEKLY_SPAN_DAYS,
                })));
        }
    }
    Ok(json!({ "weeks": to_value(&calc::weekly_hours(&sessions, &range))? }))
}

fn stats_payments(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let (sessions, range) = load(store, params)?;
    Ok(json!({ "payments": to_value(&calc::payment_breakdown(&sessions, &range))? }))
}

fn stats_cancellations(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let (sessions, range) = load(store, params)?;
    Ok(json!({
        "cancellations": to_value(&calc::cancellation_breakdown(&sessions, &range))?
    }))
}

fn stats_duration_histogram(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let (sessions, range) = load(store, params)?;
    Ok(json!({
        "buckets": to_value(&calc::duration_histogram(&sessions, &range))?,
        "averageDurationMinutes": calc::average_duration_minutes(&sessions, &range),
    }))
}

fn stats_students(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let (sessions, range) = load(store, params)?;
    Ok(json!({ "students": to_value(&calc::student_rollups(&sessions, &range))? }))
}

fn stats_summary(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let (sessions, range) = load(store, params)?;
    Ok(json!({ "summary": to_value(&calc::period_summary(&sessions, &range))? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&dyn Store, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "stats.overview" => stats_overview,
        "stats.revenueByMonth" => stats_revenue_by_month,
        "stats.weeklyHours" => stats_weekly_hours,
        "stats.payments" => stats_payments,
        "stats.cancellations" => stats_cancellations,
        "stats.durationHistogram" => stats_duration_histogram,
        "stats.students" => stats_students,
        "stats.summary" => stats_summary,
        _ => return None,
    };
    let result = store_ref(state).and_then(|s| handler(s, &req.params));
    Some(respond(&req.id, result))
}

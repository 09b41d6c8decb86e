use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    duration_minutes, has_key, optional_bool, optional_date, optional_rate, optional_str,
    parse_range, required_date, required_str, store_mut, store_ref, string_list, to_value,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    minutes_between, money, money_zero, normalize_time, now_timestamp, CancelledBy, NewSession,
    PaymentStatus, Session,
};
use crate::store::{SessionFilter, Store};
use serde_json::{json, Value};
use uuid::Uuid;

fn parse_status(params: &Value) -> Result<Option<PaymentStatus>, HandlerErr> {
    optional_str(params, "paymentStatus")?
        .map(|raw| {
            PaymentStatus::parse(&raw).ok_or_else(|| {
                HandlerErr::bad_params("paymentStatus must be paid, pending or cancelled")
                    .with_details(json!({ "paymentStatus": raw }))
            })
        })
        .transpose()
}

fn parse_cancelled_by(params: &Value) -> Result<Option<CancelledBy>, HandlerErr> {
    optional_str(params, "cancelledBy")?
        .map(|raw| {
            CancelledBy::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params("cancelledBy must be tutor or student"))
        })
        .transpose()
}

fn parse_time(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    optional_str(params, key)?
        .map(|raw| {
            normalize_time(&raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be HH:MM", key)))
        })
        .transpose()
}

fn sessions_list(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let filter = SessionFilter {
        range: parse_range(params)?,
        student_id: optional_str(params, "studentId")?,
    };
    let status = parse_status(params)?;
    let sessions: Vec<Session> = store
        .list_sessions(&filter)?
        .into_iter()
        .filter(|s| status.map_or(true, |st| s.payment_status == st))
        .collect();
    let amount = sessions
        .iter()
        .filter(|s| !s.is_cancelled())
        .fold(money_zero(), |acc, s| acc + s.total_amount);
    Ok(json!({
        "sessions": to_value(&sessions)?,
        "count": sessions.len(),
        "totalAmount": money(amount),
    }))
}

fn sessions_get(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "sessionId")?;
    Ok(json!({ "session": to_value(&store.get_session(&id)?)? }))
}

fn sessions_create(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let date = required_date(params, "date")?;
    let start_time = parse_time(params, "startTime")?;
    let end_time = parse_time(params, "endTime")?;
    let duration = match duration_minutes(params, "durationMinutes")? {
        Some(m) => m,
        None => start_time
            .as_deref()
            .zip(end_time.as_deref())
            .and_then(|(s, e)| minutes_between(s, e))
            .ok_or_else(|| {
                HandlerErr::bad_params("durationMinutes or a startTime/endTime pair is required")
            })?,
    };
    let payment_status = parse_status(params)?.unwrap_or(PaymentStatus::Pending);
    let cancelled_by = parse_cancelled_by(params)?;
    if cancelled_by.is_some() && payment_status != PaymentStatus::Cancelled {
        return Err(HandlerErr::bad_params(
            "cancelledBy only applies to cancelled sessions",
        ));
    }

    let student = store.get_student(&student_id)?;
    let hourly_rate = optional_rate(params, "hourlyRate")?.unwrap_or(student.hourly_rate);
    let session = NewSession {
        student_id: student.id,
        scheduled_class_id: optional_str(params, "scheduledClassId")?,
        date,
        start_time,
        duration_minutes: duration,
        hourly_rate,
        payment_status,
        cancelled_by,
        notes: optional_str(params, "notes")?,
    }
    .into_session(Uuid::new_v4().to_string(), now_timestamp())?;

    store.insert_session(&session)?;
    let stored = store.get_session(&session.id)?;
    tracing::info!(session_id = %stored.id, student_id = %stored.student_id, date = %stored.date, "session created");
    Ok(json!({
        "sessionId": stored.id,
        "session": to_value(&stored)?,
        "revision": store.revision(),
    }))
}

fn sessions_update(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "sessionId")?;
    let patch = params
        .get("patch")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;
    let mut session = store.get_session(&id)?;
    let mut repriced = false;
    let mut retimed = false;

    if let Some(date) = optional_date(patch, "date")? {
        session.date = date;
    }
    if has_key(patch, "startTime") {
        session.start_time = parse_time(patch, "startTime")?;
        retimed = true;
    }
    if let Some(minutes) = duration_minutes(patch, "durationMinutes")? {
        session.duration_minutes = minutes;
        repriced = true;
        retimed = true;
    } else if let Some(end) = parse_time(patch, "endTime")? {
        let minutes = session
            .start_time
            .as_deref()
            .and_then(|start| minutes_between(start, &end))
            .ok_or_else(|| HandlerErr::bad_params("endTime must be after startTime"))?;
        session.duration_minutes = minutes;
        repriced = true;
        retimed = true;
    }
    if let Some(rate) = optional_rate(patch, "hourlyRate")? {
        session.hourly_rate = money(rate);
        repriced = true;
    }
    if let Some(status) = parse_status(patch)? {
        session.payment_status = status;
        if status != PaymentStatus::Cancelled {
            session.cancelled_by = None;
        }
    }
    if has_key(patch, "cancelledBy") {
        let by = parse_cancelled_by(patch)?;
        if by.is_some() && !session.is_cancelled() {
            return Err(HandlerErr::bad_params(
                "cancelledBy only applies to cancelled sessions",
            ));
        }
        session.cancelled_by = by;
    }
    if has_key(patch, "notes") {
        session.notes = optional_str(patch, "notes")?;
    }

    if repriced {
        session.reprice()?;
    }
    if retimed {
        session.retime();
    }
    session.updated_at = now_timestamp();

    store.update_session(&session)?;
    Ok(json!({
        "session": to_value(&store.get_session(&id)?)?,
        "revision": store.revision(),
    }))
}

fn sessions_delete(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "sessionId")?;
    store.delete_session(&id)?;
    Ok(json!({ "ok": true, "revision": store.revision() }))
}

fn sessions_set_paid(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let ids = string_list(params, "sessionIds")?;
    let paid = optional_bool(params, "paid")?.unwrap_or(true);
    let updated = store.set_paid(&ids, paid)?;
    Ok(json!({
        "updated": updated,
        "revision": store.revision(),
    }))
}

/// Cancelled sessions keep their stored amount but stop counting as revenue.
fn sessions_cancel(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "sessionId")?;
    let mut session = store.get_session(&id)?;
    session.payment_status = PaymentStatus::Cancelled;
    session.cancelled_by = parse_cancelled_by(params)?;
    if has_key(params, "notes") {
        session.notes = optional_str(params, "notes")?;
    }
    session.updated_at = now_timestamp();
    store.update_session(&session)?;
    Ok(json!({
        "session": to_value(&store.get_session(&id)?)?,
        "revision": store.revision(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "sessions.list" => store_ref(state).and_then(|s| sessions_list(s, &req.params)),
        "sessions.get" => store_ref(state).and_then(|s| sessions_get(s, &req.params)),
        "sessions.create" => store_mut(state).and_then(|s| sessions_create(s, &req.params)),
        "sessions.update" => store_mut(state).and_then(|s| sessions_update(s, &req.params)),
        "sessions.delete" => store_mut(state).and_then(|s| sessions_delete(s, &req.params)),
        "sessions.setPaid" => store_mut(state).and_then(|s| sessions_set_paid(s, &req.params)),
        "sessions.cancel" => store_mut(state).and_then(|s| sessions_cancel(s, &req.params)),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    duration_minutes, has_key, optional_bool, optional_date, optional_i64, optional_str,
    required_str, store_mut, store_ref, to_value, today,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    normalize_time, now_timestamp, DateRange, NewSession, PaymentStatus, ScheduledClass,
};
use crate::store::{SessionFilter, Store};
use serde_json::{json, Value};
use uuid::Uuid;

fn parse_day_of_week(params: &Value, key: &str) -> Result<Option<u32>, HandlerErr> {
    match optional_i64(params, key)? {
        None => Ok(None),
        Some(d) if (0..=6).contains(&d) => Ok(Some(d as u32)),
        Some(_) => Err(HandlerErr::bad_params(format!(
            "{} must be between 0 (Sunday) and 6 (Saturday)",
            key
        ))),
    }
}

fn parse_start_time(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    optional_str(params, key)?
        .map(|raw| {
            normalize_time(&raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be HH:MM", key)))
        })
        .transpose()
}

fn schedules_list(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = optional_str(params, "studentId")?;
    let day = parse_day_of_week(params, "dayOfWeek")?;
    let include_inactive = optional_bool(params, "includeInactive")?.unwrap_or(true);
    let classes: Vec<ScheduledClass> = store
        .list_schedules()?
        .into_iter()
        .filter(|c| student_id.as_deref().map_or(true, |id| c.student_id == id))
        .filter(|c| day.map_or(true, |d| c.day_of_week == d))
        .filter(|c| include_inactive || c.is_active)
        .collect();
    Ok(json!({ "scheduledClasses": to_value(&classes)? }))
}

fn schedules_create(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let day_of_week = parse_day_of_week(params, "dayOfWeek")?
        .ok_or_else(|| HandlerErr::bad_params("missing dayOfWeek"))?;
    let start_time = parse_start_time(params, "startTime")?
        .ok_or_else(|| HandlerErr::bad_params("missing startTime"))?;
    let duration = duration_minutes(params, "durationMinutes")?.unwrap_or(60);

    let student = store.get_student(&student_id)?;
    let class = ScheduledClass {
        id: Uuid::new_v4().to_string(),
        student_id: student.id,
        student_name: student.name,
        day_of_week,
        start_time,
        duration_minutes: duration,
        is_active: optional_bool(params, "isActive")?.unwrap_or(true),
        notes: optional_str(params, "notes")?,
        created_at: now_timestamp(),
    };
    store.insert_schedule(&class)?;
    Ok(json!({
        "scheduledClassId": class.id,
        "scheduledClass": to_value(&class)?,
        "revision": store.revision(),
    }))
}

fn schedules_update(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "scheduledClassId")?;
    let patch = params
        .get("patch")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;
    let mut class = store.get_schedule(&id)?;

    if let Some(day) = parse_day_of_week(patch, "dayOfWeek")? {
        class.day_of_week = day;
    }
    if let Some(start) = parse_start_time(patch, "startTime")? {
        class.start_time = start;
    }
    if let Some(minutes) = duration_minutes(patch, "durationMinutes")? {
        class.duration_minutes = minutes;
    }
    if let Some(active) = optional_bool(patch, "isActive")? {
        class.is_active = active;
    }
    if has_key(patch, "notes") {
        class.notes = optional_str(patch, "notes")?;
    }

    store.update_schedule(&class)?;
    Ok(json!({
        "scheduledClass": to_value(&class)?,
        "revision": store.revision(),
    }))
}

fn schedules_delete(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "scheduledClassId")?;
    store.delete_schedule(&id)?;
    Ok(json!({ "ok": true, "revision": store.revision() }))
}

/// Active slots that fall on `date`, each paired with the session already
/// logged for that student on that day (if any).
fn schedules_for_day(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let date = match optional_date(params, "date")? {
        Some(d) => d,
        None => today(params)?,
    };
    let sessions = store.list_sessions(&SessionFilter {
        range: DateRange::between(date, date),
        student_id: None,
    })?;
    let rows: Vec<Value> = store
        .list_schedules()?
        .into_iter()
        .filter(|c| c.occurs_on(date))
        .map(|c| -> Result<Value, HandlerErr> {
            let logged = sessions.iter().find(|s| s.student_id == c.student_id);
            Ok(json!({
                "scheduledClass": to_value(&c)?,
                "loggedSessionId": logged.map(|s| s.id.clone()),
                "logged": logged.is_some(),
            }))
        })
        .collect::<Result<_, _>>()?;
    Ok(json!({ "date": date.to_string(), "classes": rows }))
}

/// Turns one occurrence of a weekly slot into a billable session that
/// inherits the student's current rate and the slot's time and duration.
fn schedules_log(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "scheduledClassId")?;
    let date = match optional_date(params, "date")? {
        Some(d) => d,
        None => today(params)?,
    };
    let class = store.get_schedule(&id)?;
    if !class.occurs_on(date) {
        let reason = if class.is_active {
            "scheduled class does not occur on that date"
        } else {
            "scheduled class is inactive"
        };
        return Err(HandlerErr::bad_params(reason).with_details(json!({
            "scheduledClassId": class.id,
            "date": date.to_string(),
            "dayOfWeek": class.day_of_week,
        })));
    }
    let student = store.get_student(&class.student_id)?;
    let payment_status = match optional_str(params, "paymentStatus")? {
        Some(raw) => PaymentStatus::parse(&raw)
            .filter(|s| *s != PaymentStatus::Cancelled)
            .ok_or_else(|| HandlerErr::bad_params("paymentStatus must be paid or pending"))?,
        None => PaymentStatus::Pending,
    };

    let session = NewSession {
        student_id: student.id,
        scheduled_class_id: Some(class.id),
        date,
        start_time: Some(class.start_time),
        duration_minutes: class.duration_minutes,
        hourly_rate: student.hourly_rate,
        payment_status,
        cancelled_by: None,
        notes: optional_str(params, "notes")?,
    }
    .into_session(Uuid::new_v4().to_string(), now_timestamp())?;
    store.insert_session(&session)?;
    let stored = store.get_session(&session.id)?;
    tracing::info!(session_id = %stored.id, scheduled_class_id = %id, %date, "scheduled class logged");
    Ok(json!({
        "sessionId": stored.id,
        "session": to_value(&stored)?,
        "revision": store.revision(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "schedules.list" => store_ref(state).and_then(|s| schedules_list(s, &req.params)),
        "schedules.create" => store_mut(state).and_then(|s| schedules_create(s, &req.params)),
        "schedules.update" => store_mut(state).and_then(|s| schedules_update(s, &req.params)),
        "schedules.delete" => store_mut(state).and_then(|s| schedules_delete(s, &req.params)),
        "schedules.forDay" => store_ref(state).and_then(|s| schedules_for_day(s, &req.params)),
        "schedules.log" => store_mut(state).and_then(|s| schedules_log(s, &req.params)),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

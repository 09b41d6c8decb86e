use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    has_key, optional_bool, optional_rate, optional_str, required_str, store_mut, store_ref,
    to_value,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{money, now_timestamp, Student};
use crate::store::Store;
use serde_json::{json, Value};
use uuid::Uuid;

fn students_list(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let include_inactive = optional_bool(params, "includeInactive")?.unwrap_or(true);
    let search = optional_str(params, "search")?.map(|s| s.to_lowercase());
    let students: Vec<Student> = store
        .list_students()?
        .into_iter()
        .filter(|s| include_inactive || s.is_active)
        .filter(|s| {
            search.as_deref().map_or(true, |q| {
                s.name.to_lowercase().contains(q)
                    || s.subject.as_deref().unwrap_or("").to_lowercase().contains(q)
            })
        })
        .collect();
    let active_count = students.iter().filter(|s| s.is_active).count();
    Ok(json!({
        "students": to_value(&students)?,
        "activeCount": active_count,
    }))
}

fn students_get(store: &dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "studentId")?;
    Ok(json!({ "student": to_value(&store.get_student(&id)?)? }))
}

fn students_create(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let name = required_str(params, "name")
        .map_err(|_| HandlerErr::bad_params("name must not be empty"))?;
    let hourly_rate = match optional_rate(params, "hourlyRate")? {
        Some(rate) => rate,
        None => store.profile()?.default_hourly_rate,
    };
    let now = now_timestamp();
    let student = Student {
        id: Uuid::new_v4().to_string(),
        name,
        email: optional_str(params, "email")?,
        phone: optional_str(params, "phone")?,
        parent_name: optional_str(params, "parentName")?,
        subject: optional_str(params, "subject")?,
        hourly_rate: money(hourly_rate),
        is_active: optional_bool(params, "isActive")?.unwrap_or(true),
        notes: optional_str(params, "notes")?,
        created_at: now.clone(),
        updated_at: now,
    };
    store.insert_student(&student)?;
    tracing::info!(student_id = %student.id, "student created");
    Ok(json!({
        "studentId": student.id,
        "student": to_value(&student)?,
        "revision": store.revision(),
    }))
}

fn students_update(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "studentId")?;
    let patch = params
        .get("patch")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;
    let mut student = store.get_student(&id)?;

    if has_key(patch, "name") {
        student.name = optional_str(patch, "name")?
            .ok_or_else(|| HandlerErr::bad_params("name must not be empty"))?;
    }
    if has_key(patch, "email") {
        student.email = optional_str(patch, "email")?;
    }
    if has_key(patch, "phone") {
        student.phone = optional_str(patch, "phone")?;
    }
    if has_key(patch, "parentName") {
        student.parent_name = optional_str(patch, "parentName")?;
    }
    if has_key(patch, "subject") {
        student.subject = optional_str(patch, "subject")?;
    }
    if has_key(patch, "notes") {
        student.notes = optional_str(patch, "notes")?;
    }
    // Existing sessions keep their rate snapshot.
    if let Some(rate) = optional_rate(patch, "hourlyRate")? {
        student.hourly_rate = money(rate);
    }
    if let Some(active) = optional_bool(patch, "isActive")? {
        student.is_active = active;
    }
    student.updated_at = now_timestamp();

    store.update_student(&student)?;
    Ok(json!({
        "student": to_value(&student)?,
        "revision": store.revision(),
    }))
}

fn students_delete(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "studentId")?;
    let summary = store.delete_student(&id)?;
    tracing::info!(
        student_id = %id,
        sessions = summary.sessions_deleted,
        scheduled_classes = summary.scheduled_classes_deleted,
        "student deleted"
    );
    Ok(json!({
        "ok": true,
        "deleted": to_value(&summary)?,
        "revision": store.revision(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "students.list" => store_ref(state).and_then(|s| students_list(s, &req.params)),
        "students.get" => store_ref(state).and_then(|s| students_get(s, &req.params)),
        "students.create" => store_mut(state).and_then(|s| students_create(s, &req.params)),
        "students.update" => store_mut(state).and_then(|s| students_update(s, &req.params)),
        "students.delete" => store_mut(state).and_then(|s| students_delete(s, &req.params)),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

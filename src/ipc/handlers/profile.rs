use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{has_key, optional_rate, optional_str, store_mut, store_ref, to_value};
use crate::ipc::types::{AppState, Request};
use crate::model::{money, Currency};
use crate::store::Store;
use serde_json::{json, Value};

fn profile_get(store: &dyn Store) -> Result<Value, HandlerErr> {
    let profile = store.profile()?;
    Ok(json!({ "profile": to_value(&profile)? }))
}

fn profile_update(store: &mut dyn Store, params: &Value) -> Result<Value, HandlerErr> {
    let patch = params
        .get("patch")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;
    let mut profile = store.profile()?;

    if let Some(name) = optional_str(patch, "businessName")? {
        profile.business_name = name;
    }
    if has_key(patch, "tutorName") {
        profile.tutor_name = optional_str(patch, "tutorName")?.unwrap_or_default();
    }
    if has_key(patch, "email") {
        profile.email = optional_str(patch, "email")?;
    }
    if has_key(patch, "phone") {
        profile.phone = optional_str(patch, "phone")?;
    }
    if let Some(raw) = optional_str(patch, "currency")? {
        profile.currency = Currency::parse(&raw).ok_or_else(|| {
            HandlerErr::bad_params("currency must be USD or EUR")
                .with_details(json!({ "currency": raw }))
        })?;
    }
    if let Some(rate) = optional_rate(patch, "defaultHourlyRate")? {
        profile.default_hourly_rate = money(rate);
    }

    store.save_profile(&profile)?;
    Ok(json!({
        "profile": to_value(&profile)?,
        "revision": store.revision(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "profile.get" => store_ref(state).and_then(profile_get),
        "profile.update" => store_mut(state).and_then(|s| profile_update(s, &req.params)),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

use super::error::HandlerErr;
use super::types::AppState;
use crate::model::{DateRange, Period, MAX_HOURLY_RATE, MAX_SESSION_MINUTES};
use crate::store::Store;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

pub fn store_ref(state: &AppState) -> Result<&dyn Store, HandlerErr> {
    state
        .store
        .as_deref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace or start demo mode first"))
}

pub fn store_mut(state: &mut AppState) -> Result<&mut dyn Store, HandlerErr> {
    match state.store.as_deref_mut() {
        Some(store) => Ok(store),
        None => Err(HandlerErr::new(
            "no_workspace",
            "select a workspace or start demo mode first",
        )),
    }
}

pub fn to_value<T: Serialize>(v: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(v).map_err(|e| HandlerErr::new("serialize_failed", e.to_string()))
}

pub fn has_key(params: &Value, key: &str) -> bool {
    params.get(key).is_some()
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    match optional_str(params, key)? {
        Some(v) => Ok(v),
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

/// Missing, null and blank strings all read as `None`.
pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok((!t.is_empty()).then(|| t.to_string()))
        }
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn optional_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

pub fn optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn parse_date(raw: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn optional_date(params: &Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    optional_str(params, key)?
        .map(|s| parse_date(&s, key))
        .transpose()
}

pub fn required_date(params: &Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    parse_date(&required_str(params, key)?, key)
}

/// Accepts JSON numbers or numeric strings. Negative amounts are rejected.
pub fn optional_decimal(params: &Value, key: &str) -> Result<Option<Decimal>, HandlerErr> {
    let raw = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(HandlerErr::bad_params(format!("{} must be a number", key))),
    };
    let value = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| HandlerErr::bad_params(format!("{} must be a number", key)))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(HandlerErr::bad_params(format!("{} must not be negative", key)));
    }
    Ok(Some(value))
}

/// An hourly rate: a non-negative decimal no larger than `MAX_HOURLY_RATE`.
pub fn optional_rate(params: &Value, key: &str) -> Result<Option<Decimal>, HandlerErr> {
    match optional_decimal(params, key)? {
        Some(rate) if rate > Decimal::from(MAX_HOURLY_RATE) => Err(HandlerErr::bad_params(
            format!("{} must not exceed {}", key, MAX_HOURLY_RATE),
        )
        .with_details(serde_json::json!({ "field": key, "max": MAX_HOURLY_RATE }))),
        other => Ok(other),
    }
}

pub fn string_list(params: &Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    let Some(arr) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params(format!("{} must be an array of ids", key)));
    };
    arr.iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must contain strings", key)))
        })
        .collect()
}

/// `today` may be pinned by the caller; otherwise local time decides.
pub fn today(params: &Value) -> Result<NaiveDate, HandlerErr> {
    Ok(optional_date(params, "today")?.unwrap_or_else(|| chrono::Local::now().date_naive()))
}

/// Explicit `startDate`/`endDate` win over a `period` preset. No selector
/// means every session.
pub fn parse_range(params: &Value) -> Result<DateRange, HandlerErr> {
    let start = optional_date(params, "startDate")?;
    let end = optional_date(params, "endDate")?;
    let range = if start.is_some() || end.is_some() {
        DateRange::new(start, end)
    } else if let Some(raw) = optional_str(params, "period")? {
        let period = Period::parse(&raw).ok_or_else(|| {
            HandlerErr::bad_params(
                "period must be one of: thisWeek, thisMonth, lastMonth, last3Months, last6Months, thisYear, all",
            )
            .with_details(serde_json::json!({ "period": raw }))
        })?;
        DateRange::for_period(period, today(params)?)
    } else {
        DateRange::all()
    };
    if let (Some(s), Some(e)) = (range.start, range.end) {
        if e < s {
            return Err(HandlerErr::bad_params("endDate must not be before startDate"));
        }
    }
    Ok(range)
}

pub fn duration_minutes(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match optional_i64(params, key)? {
        Some(m) if m <= 0 => Err(HandlerErr::bad_params(format!("{} must be positive", key))),
        Some(m) if m > MAX_SESSION_MINUTES => Err(HandlerErr::bad_params(format!(
            "{} must be at most {} (one day)",
            key, MAX_SESSION_MINUTES
        ))),
        other => Ok(other),
    }
}

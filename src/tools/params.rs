use chrono::{DateTime, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::ToolError;
use super::JsonObject;

pub const MAX_LIMIT: u32 = 1000;
pub const MAX_SCORE: u32 = 99;

const UPSTREAM_DATETIME: &str = "%Y-%m-%dT%H:%M:%S";

/// Typed tool arguments. Structural checks come from serde, the rest from `validate`.
pub trait ToolParams: DeserializeOwned + JsonSchema {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

pub(crate) fn parse_params<P: ToolParams>(arguments: JsonObject) -> Result<P, ToolError> {
    let params: P = serde_json::from_value(Value::Object(arguments))
        .map_err(|e| ToolError::Validation(e.to_string()))?;
    params.validate().map_err(ToolError::Validation)?;
    Ok(params)
}

pub(crate) fn schema_of<P: JsonSchema>() -> JsonObject {
    match serde_json::to_value(schemars::schema_for!(P)) {
        Ok(Value::Object(mut schema)) => {
            schema.remove("$schema");
            schema
        }
        _ => {
            let mut fallback = JsonObject::new();
            fallback.insert("type".to_string(), Value::String("object".to_string()));
            fallback
        }
    }
}

pub(crate) fn to_payload<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value)
        .map_err(|e| ToolError::Internal(format!("failed to serialize payload: {}", e)))
}

pub(crate) fn check_id(field: &str, value: u64) -> Result<(), String> {
    if value == 0 {
        return Err(format!("{} must be a positive integer", field));
    }
    Ok(())
}

pub(crate) fn check_ids(field: &str, values: &[u64]) -> Result<(), String> {
    if values.is_empty() {
        return Err(format!("{} must contain at least one id", field));
    }
    values.iter().try_for_each(|v| check_id(field, *v))
}

pub(crate) fn check_limit(limit: Option<u32>) -> Result<(), String> {
    match limit {
        Some(l) if !(1..=MAX_LIMIT).contains(&l) => {
            Err(format!("limit must be between 1 and {}, got {}", MAX_LIMIT, l))
        }
        _ => Ok(()),
    }
}

pub(crate) fn check_score(field: &str, value: Option<u32>) -> Result<(), String> {
    match value {
        Some(v) if v > MAX_SCORE => Err(format!(
            "{} must be between 0 and {}, got {}",
            field, MAX_SCORE, v
        )),
        _ => Ok(()),
    }
}

pub(crate) fn check_not_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    Ok(())
}

pub(crate) fn check_optional_not_blank(field: &str, value: Option<&str>) -> Result<(), String> {
    value.map_or(Ok(()), |v| check_not_blank(field, v))
}

pub(crate) fn check_tags(tags: &[String]) -> Result<(), String> {
    tags.iter().try_for_each(|t| check_not_blank("tags", t))
}

/// Accepts `field` or `-field` for each allowed field.
pub(crate) fn check_ordering(value: Option<&str>, allowed: &[&str]) -> Result<(), String> {
    let Some(value) = value else {
        return Ok(());
    };
    let field = value.strip_prefix('-').unwrap_or(value);
    if allowed.contains(&field) {
        Ok(())
    } else {
        Err(format!(
            "ordering must be one of {:?} (optionally prefixed with '-'), got '{}'",
            allowed, value
        ))
    }
}

pub(crate) fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, UPSTREAM_DATETIME) {
        return Ok(dt);
    }
    if let Some(dt) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(dt);
    }
    Err(format!(
        "{} must be a date (YYYY-MM-DD) or datetime (YYYY-MM-DDTHH:MM:SS), got '{}'",
        field, value
    ))
}

pub(crate) fn format_datetime(value: NaiveDateTime) -> String {
    value.format(UPSTREAM_DATETIME).to_string()
}

/// Validates an optional date range and renders both ends in upstream format.
pub(crate) fn date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<String>, Option<String>), String> {
    let start = start.map(|s| parse_datetime("start_date", s)).transpose()?;
    let end = end.map(|s| parse_datetime("end_date", s)).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err("start_date must not be after end_date".to_string());
        }
    }
    Ok((start.map(format_datetime), end.map(format_datetime)))
}

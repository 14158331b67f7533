use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use super::error::HandlerError;
use crate::day_codes::RecurringDays;
use crate::schedule::id_from_value;

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerError> {
    params
        .get(key)
        .and_then(id_from_value)
        .ok_or_else(|| HandlerError::bad_params(format!("missing {}", key)))
}

/// Optional filter-style id: absent, null and blank all mean "none".
pub fn opt_id(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(id_from_value)
}

pub fn opt_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(HandlerError::bad_params(format!("{} must be boolean", key))),
    }
}

/// `YYYY-MM-DD` (any day of the month) or `YYYY-MM`.
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok())
}

pub fn required_month(params: &Value) -> Result<NaiveDate, HandlerError> {
    let raw = params
        .get("month")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerError::bad_params("missing month"))?;
    parse_month(raw)
        .ok_or_else(|| HandlerError::bad_params("month must be YYYY-MM or YYYY-MM-DD"))
}

pub fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

pub fn parse_name(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} must be string", key))?
        .trim();
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

/// Nullable reference to another record.
pub fn parse_opt_ref(v: &Value, key: &str) -> Result<Option<String>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(_) | Value::Number(_) => Ok(id_from_value(v)),
        _ => Err(format!("{} must be string or null", key)),
    }
}

/// Nullable strict `YYYY-MM-DD`, returned in canonical form.
pub fn parse_opt_date(v: &Value, key: &str) -> Result<Option<String>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(|d| Some(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| format!("{} must be YYYY-MM-DD", key)),
        _ => Err(format!("{} must be string or null", key)),
    }
}

/// Nullable `HH:MM`, returned zero-padded.
pub fn parse_opt_time(v: &Value, key: &str) -> Result<Option<String>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(|t| Some(t.format("%H:%M").to_string()))
            .map_err(|_| format!("{} must be HH:MM", key)),
        _ => Err(format!("{} must be string or null", key)),
    }
}

/// Nullable day-code list, either `"1,3,5"` or `[1, 3, 5]`. Unlike the
/// lenient reader used for expansion, every code must be known.
pub fn parse_opt_days(v: &Value, key: &str) -> Result<Option<String>, String> {
    let joined = match v {
        Value::Null => return Ok(None),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => parts.push(s.clone()),
                    Value::Number(n) => parts.push(n.to_string()),
                    _ => return Err(format!("{} entries must be day codes", key)),
                }
            }
            parts.join(",")
        }
        _ => return Err(format!("{} must be string, array or null", key)),
    };
    RecurringDays::validate_strict(&joined)
        .map(Some)
        .map_err(|e| format!("{}: {}", key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn month_accepts_day_or_month_forms() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        assert_eq!(parse_month("2024-01"), Some(jan));
        assert_eq!(parse_month(" 2024-01-01 "), Some(jan));
        assert_eq!(parse_month("2024-01-15").map(|d| d.to_string()).as_deref(), Some("2024-01-15"));
        assert_eq!(parse_month("January"), None);
        assert_eq!(parse_month("2024-13"), None);
    }

    #[test]
    fn required_str_accepts_numeric_ids() {
        let p = json!({ "classId": 12, "blank": "  " });
        assert_eq!(required_str(&p, "classId").expect("id"), "12");
        assert!(required_str(&p, "blank").is_err());
        assert!(required_str(&p, "missing").is_err());
    }

    #[test]
    fn dates_and_times_are_canonicalized() {
        assert_eq!(
            parse_opt_date(&json!(" 2024-01-05 "), "startDate"),
            Ok(Some("2024-01-05".to_string()))
        );
        assert_eq!(parse_opt_date(&json!(null), "startDate"), Ok(None));
        assert!(parse_opt_date(&json!("05/01/2024"), "startDate").is_err());

        assert_eq!(parse_opt_time(&json!(" 09:05 "), "startTime"), Ok(Some("09:05".to_string())));
        assert!(parse_opt_time(&json!("25:00"), "startTime").is_err());
    }

    #[test]
    fn day_codes_are_strict_on_write() {
        assert_eq!(parse_opt_days(&json!([2, "4"]), "recurringDays"), Ok(Some("2,4".to_string())));
        assert_eq!(parse_opt_days(&json!("8"), "recurringDays"), Ok(Some("8".to_string())));
        assert_eq!(parse_opt_days(&json!(null), "recurringDays"), Ok(None));
        assert!(parse_opt_days(&json!("2,9"), "recurringDays").is_err());
        assert!(parse_opt_days(&json!([true]), "recurringDays").is_err());
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(parse_name(&json!("  Algebra "), "name", 10), Ok("Algebra".to_string()));
        assert!(parse_name(&json!("   "), "name", 10).is_err());
        assert!(parse_name(&json!("x".repeat(11)), "name", 10).is_err());
    }
}

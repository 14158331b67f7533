use crate::db;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::params::parse_i64_range;
use crate::ipc::types::{AppState, Request};
use crate::schedule::DEFAULT_PADDING_DAYS;
use serde_json::{json, Map, Value};

pub const PADDING_DAYS_MAX: i64 = 14;

#[derive(Clone, Copy)]
enum SetupSection {
    Calendar,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "calendar" => Some(Self::Calendar),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Calendar => "setup.calendar",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Calendar => json!({
            "paddingDays": DEFAULT_PADDING_DAYS,
            "includeSkippedByDefault": false
        }),
    }
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Calendar => match k.as_str() {
                "paddingDays" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, PADDING_DAYS_MAX)?));
                }
                "includeSkippedByDefault" => {
                    let b = v.as_bool().ok_or_else(|| format!("{} must be boolean", k))?;
                    obj.insert(k.clone(), Value::Bool(b));
                }
                _ => return Err(format!("unknown calendar field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Apply field by field so one bad historical value does not
            // discard the rest.
            for (k, v) in saved_obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                let _ = merge_section_patch(section, &mut current, &single);
            }
        }
    }
    Ok(current)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarSettings {
    pub padding_days: u64,
    pub include_skipped_by_default: bool,
}

pub fn load_calendar_settings(conn: &rusqlite::Connection) -> anyhow::Result<CalendarSettings> {
    let section = load_section(conn, SetupSection::Calendar)?;
    Ok(CalendarSettings {
        padding_days: section
            .get("paddingDays")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_PADDING_DAYS),
        include_skipped_by_default: section
            .get("includeSkippedByDefault")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    })
}

fn handle_setup_get(state: &mut AppState, _req: &Request) -> Result<Value, HandlerError> {
    let conn = state.conn()?;
    let calendar = load_section(conn, SetupSection::Calendar)
        .map_err(|e| HandlerError::db("db_query_failed", e))?;
    Ok(json!({ "calendar": calendar }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = state.conn()?;
    let section_raw = req
        .params
        .get("section")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerError::bad_params("missing section"))?;
    let section = SetupSection::parse(section_raw)
        .ok_or_else(|| HandlerError::bad_params("unknown section"))?;
    let patch = req
        .params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerError::bad_params("patch must be an object"))?;

    let mut current =
        load_section(conn, section).map_err(|e| HandlerError::db("db_query_failed", e))?;
    merge_section_patch(section, &mut current, patch).map_err(HandlerError::BadParams)?;
    db::settings_set_json(conn, section.key(), &current)
        .map_err(|e| HandlerError::db("db_update_failed", e))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "setup.get" => handle_setup_get(state, req),
        "setup.update" => handle_setup_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

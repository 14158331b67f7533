use crate::db;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::handlers::setup::{load_calendar_settings, PADDING_DAYS_MAX};
use crate::ipc::params::{opt_bool, opt_id, parse_i64_range, required_month};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{
    expand_schedule_in, expand_schedule_with_report, id_from_value, ClassDefinition,
    ExpansionReport, ExpansionWindow, ScheduleFilter, SkipReason, SkippedClass,
    DEFAULT_PADDING_DAYS,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::debug;

fn window_for(month: NaiveDate, padding_days: u64) -> Result<ExpansionWindow, HandlerError> {
    ExpansionWindow::for_month_padded(month, padding_days)
        .ok_or_else(|| HandlerError::bad_params("month out of range"))
}

fn filter_from(params: &Value) -> ScheduleFilter {
    ScheduleFilter::new(
        opt_id(params, "teacherId").as_deref(),
        opt_id(params, "roomId").as_deref(),
    )
}

fn expand(
    classes: &[ClassDefinition],
    window: &ExpansionWindow,
    filter: &ScheduleFilter,
    include_skipped: bool,
) -> ExpansionReport {
    if include_skipped {
        expand_schedule_with_report(classes, window, filter)
    } else {
        ExpansionReport {
            window: *window,
            events: expand_schedule_in(classes, window, filter),
            skipped: Vec::new(),
        }
    }
}

fn render(
    month: NaiveDate,
    filter: &ScheduleFilter,
    report: &ExpansionReport,
    include_skipped: bool,
) -> Result<Value, HandlerError> {
    let mut out = json!({
        "month": month.format("%Y-%m").to_string(),
        "teacherId": filter.teacher_id(),
        "roomId": filter.room_id(),
        "window": serde_json::to_value(report.window).map_err(HandlerError::internal)?,
        "events": serde_json::to_value(&report.events).map_err(HandlerError::internal)?,
    });
    if include_skipped {
        out["skipped"] = serde_json::to_value(&report.skipped).map_err(HandlerError::internal)?;
    }
    Ok(out)
}

fn handle_schedule_events(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let conn = state.conn()?;
    let month = required_month(&req.params)?;
    let settings =
        load_calendar_settings(conn).map_err(|e| HandlerError::db("db_query_failed", e))?;
    let include_skipped =
        opt_bool(&req.params, "includeSkipped")?.unwrap_or(settings.include_skipped_by_default);
    let window = window_for(month, settings.padding_days)?;
    let filter = filter_from(&req.params);

    let classes =
        db::load_class_definitions(conn).map_err(|e| HandlerError::db("db_query_failed", e))?;
    let report = expand(&classes, &window, &filter, include_skipped);
    debug!(
        classes = classes.len(),
        events = report.events.len(),
        "workspace schedule expanded"
    );
    render(month, &filter, &report, include_skipped)
}

fn handle_schedule_expand(
    _state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let items = req
        .params
        .get("classes")
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerError::bad_params("classes must be an array"))?;
    let month = required_month(&req.params)?;
    let include_skipped = opt_bool(&req.params, "includeSkipped")?.unwrap_or(false);
    let padding_days = match req.params.get("paddingDays") {
        None | Some(Value::Null) => DEFAULT_PADDING_DAYS,
        Some(v) => parse_i64_range(v, "paddingDays", 0, PADDING_DAYS_MAX)
            .map_err(HandlerError::BadParams)? as u64,
    };
    let window = window_for(month, padding_days)?;
    let filter = filter_from(&req.params);

    // Positions of readable definitions in the caller's array, so skip
    // indices refer to what the caller sent.
    let mut classes = Vec::with_capacity(items.len());
    let mut positions = Vec::with_capacity(items.len());
    let mut unreadable = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let parsed = item
            .is_object()
            .then(|| serde_json::from_value::<ClassDefinition>(item.clone()).ok())
            .flatten();
        match parsed {
            Some(class) => {
                classes.push(class);
                positions.push(index);
            }
            None => unreadable.push(SkippedClass::new(
                index,
                item.get("classId").and_then(id_from_value),
                SkipReason::Unreadable,
            )),
        }
    }

    let mut report = expand(&classes, &window, &filter, include_skipped);
    if include_skipped {
        for skipped in &mut report.skipped {
            skipped.index = positions.get(skipped.index).copied().unwrap_or(skipped.index);
        }
        report.skipped.extend(unreadable);
        report.skipped.sort_by_key(|s| s.index);
    }
    render(month, &filter, &report, include_skipped)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "schedule.events" => handle_schedule_events(state, req),
        "schedule.expand" => handle_schedule_expand(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

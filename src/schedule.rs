//! Expansion of recurring weekly class schedules into per-day calendar events.
//!
//! Everything here is pure: no clock, no I/O, no logging. The reference month
//! is always supplied by the caller.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::day_codes::RecurringDays;

/// Days added on each side of the visible month so a month grid also shows
/// the trailing/leading days of the neighbouring months.
pub const DEFAULT_PADDING_DAYS: u64 = 7;

/// Fields on an event that belong to the occurrence, not the class.
const RESERVED_EVENT_FIELDS: [&str; 2] = ["id", "date"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub class_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub teacher_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub room_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "lenient_recurring_days",
        skip_serializing_if = "Option::is_none"
    )]
    pub recurring_days: Option<RecurringDays>,
    /// Everything else (name, times, display names) rides along untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Opaque ids arrive as strings or numbers; blank means absent.
pub fn id_from_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, or a timestamp starting with one
/// (`2024-01-01T00:00:00.000Z`, `2024-01-01 00:00:00`).
pub fn parse_lenient_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok())
}

fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(id_from_value))
}

fn lenient_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref()
        .and_then(|v| v.as_str())
        .and_then(parse_lenient_date))
}

fn lenient_recurring_days<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<RecurringDays>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(RecurringDays::from_value))
}

impl ClassDefinition {
    fn as_event_template(&self) -> ClassDefinition {
        let mut template = self.clone();
        for key in RESERVED_EVENT_FIELDS {
            template.extra.remove(key);
        }
        template
    }
}

/// One concrete occurrence of a class on a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub id: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub class: ClassDefinition,
}

pub fn event_id(class_id: &str, date: NaiveDate) -> String {
    format!("{}-{}", class_id, date.format("%Y%m%d"))
}

/// Inclusive date range that expansion scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpansionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ExpansionWindow {
    pub fn for_month(visible_month: NaiveDate) -> Option<Self> {
        Self::for_month_padded(visible_month, DEFAULT_PADDING_DAYS)
    }

    pub fn for_month_padded(visible_month: NaiveDate, padding_days: u64) -> Option<Self> {
        let first = visible_month.with_day(1)?;
        let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Self {
            start: first.checked_sub_days(Days::new(padding_days))?,
            end: last.checked_add_days(Days::new(padding_days))?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Intersection of `[start, end]` with the window, if any.
    pub fn clamp(&self, start: NaiveDate, end: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let from = start.max(self.start);
        let to = end.min(self.end);
        (from <= to).then_some((from, to))
    }
}

/// Optional teacher/room restriction. A set filter only matches classes
/// carrying exactly that id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleFilter {
    teacher_id: Option<String>,
    room_id: Option<String>,
}

fn normalize_filter(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn filter_accepts(filter: Option<&str>, value: Option<&str>) -> bool {
    match filter {
        Some(f) => value == Some(f),
        None => true,
    }
}

impl ScheduleFilter {
    pub fn new(teacher_id: Option<&str>, room_id: Option<&str>) -> Self {
        Self {
            teacher_id: normalize_filter(teacher_id),
            room_id: normalize_filter(room_id),
        }
    }

    pub fn teacher_id(&self) -> Option<&str> {
        self.teacher_id.as_deref()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    #[error("class is not an object")]
    Unreadable,
    #[error("teacher does not match filter")]
    TeacherMismatch,
    #[error("room does not match filter")]
    RoomMismatch,
    #[error("class has no id")]
    MissingClassId,
    #[error("class has no start date")]
    MissingStartDate,
    #[error("class has no end date")]
    MissingEndDate,
    #[error("class has no recurring days")]
    MissingRecurringDays,
    #[error("class dates do not overlap the visible range")]
    OutsideWindow,
    #[error("recurring days contain no known day code")]
    NoValidDayCodes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedClass {
    /// Position in the input sequence.
    pub index: usize,
    pub class_id: Option<String>,
    pub reason: SkipReason,
    pub message: String,
}

impl SkippedClass {
    pub fn new(index: usize, class_id: Option<String>, reason: SkipReason) -> Self {
        Self {
            index,
            class_id,
            reason,
            message: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionReport {
    pub window: ExpansionWindow,
    pub events: Vec<CalendarEvent>,
    pub skipped: Vec<SkippedClass>,
}

fn expand_class(
    class: &ClassDefinition,
    window: &ExpansionWindow,
    filter: &ScheduleFilter,
) -> Result<Vec<CalendarEvent>, SkipReason> {
    if !filter_accepts(filter.teacher_id(), class.teacher_id.as_deref()) {
        return Err(SkipReason::TeacherMismatch);
    }
    if !filter_accepts(filter.room_id(), class.room_id.as_deref()) {
        return Err(SkipReason::RoomMismatch);
    }

    let class_id = class.class_id.as_deref().ok_or(SkipReason::MissingClassId)?;
    let start = class.start_date.ok_or(SkipReason::MissingStartDate)?;
    let end = class.end_date.ok_or(SkipReason::MissingEndDate)?;
    let days = class
        .recurring_days
        .as_ref()
        .ok_or(SkipReason::MissingRecurringDays)?;

    let (from, to) = window.clamp(start, end).ok_or(SkipReason::OutsideWindow)?;

    let weekdays = days.weekdays();
    if weekdays.is_empty() {
        return Err(SkipReason::NoValidDayCodes);
    }

    let template = class.as_event_template();
    Ok(from
        .iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| weekdays.contains(d.weekday()))
        .map(|date| CalendarEvent {
            id: event_id(class_id, date),
            date,
            class: template.clone(),
        })
        .collect())
}

/// Events for every class in `classes` that fall inside `visible_month`'s
/// padded window, class order outer, date order inner.
pub fn expand_schedule(
    classes: &[ClassDefinition],
    visible_month: NaiveDate,
    filter: &ScheduleFilter,
) -> Vec<CalendarEvent> {
    match ExpansionWindow::for_month(visible_month) {
        Some(window) => expand_schedule_in(classes, &window, filter),
        None => Vec::new(),
    }
}

pub fn expand_schedule_in(
    classes: &[ClassDefinition],
    window: &ExpansionWindow,
    filter: &ScheduleFilter,
) -> Vec<CalendarEvent> {
    classes
        .iter()
        .filter_map(|c| expand_class(c, window, filter).ok())
        .flatten()
        .collect()
}

/// Same events as [`expand_schedule_in`], plus the reason each excluded
/// class produced nothing.
pub fn expand_schedule_with_report(
    classes: &[ClassDefinition],
    window: &ExpansionWindow,
    filter: &ScheduleFilter,
) -> ExpansionReport {
    let mut events = Vec::new();
    let mut skipped = Vec::new();
    for (index, class) in classes.iter().enumerate() {
        match expand_class(class, window, filter) {
            Ok(mut found) => events.append(&mut found),
            Err(reason) => skipped.push(SkippedClass::new(index, class.class_id.clone(), reason)),
        }
    }
    ExpansionReport {
        window: *window,
        events,
        skipped,
    }
}

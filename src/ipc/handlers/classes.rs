use crate::day_codes::RecurringDays;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::params::{
    parse_name, parse_opt_date, parse_opt_days, parse_opt_ref, parse_opt_time, required_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Map, Value};
use uuid::Uuid;

const CLASS_NAME_MAX: usize = 120;

/// Editable columns of a `classes` row, in canonical text form.
#[derive(Debug, Default, Clone)]
struct ClassRow {
    name: String,
    teacher_id: Option<String>,
    room_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    recurring_days: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
}

fn apply_class_patch(row: &mut ClassRow, patch: &Map<String, Value>) -> Result<(), String> {
    for (k, v) in patch {
        match k.as_str() {
            "name" => row.name = parse_name(v, k, CLASS_NAME_MAX)?,
            "teacherId" => row.teacher_id = parse_opt_ref(v, k)?,
            "roomId" => row.room_id = parse_opt_ref(v, k)?,
            "startDate" => row.start_date = parse_opt_date(v, k)?,
            "endDate" => row.end_date = parse_opt_date(v, k)?,
            "recurringDays" => row.recurring_days = parse_opt_days(v, k)?,
            "startTime" => row.start_time = parse_opt_time(v, k)?,
            "endTime" => row.end_time = parse_opt_time(v, k)?,
            _ => return Err(format!("unknown class field: {}", k)),
        }
    }
    Ok(())
}

fn ensure_exists(
    conn: &Connection,
    table: &str,
    id: Option<&str>,
    label: &'static str,
) -> Result<(), HandlerError> {
    let Some(id) = id else {
        return Ok(());
    };
    let found: Option<i64> = conn
        .query_row(&format!("SELECT 1 FROM {} WHERE id = ?", table), [id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| HandlerError::db("db_query_failed", e))?;
    if found.is_none() {
        return Err(HandlerError::NotFound(label));
    }
    Ok(())
}

/// Cross-field rules that single-field parsing cannot see.
fn validate_class_row(conn: &Connection, row: &ClassRow) -> Result<(), HandlerError> {
    // Canonical YYYY-MM-DD and HH:MM compare correctly as text.
    if let (Some(s), Some(e)) = (&row.start_date, &row.end_date) {
        if s > e {
            return Err(HandlerError::bad_params("startDate must not be after endDate"));
        }
    }
    if let (Some(s), Some(e)) = (&row.start_time, &row.end_time) {
        if s >= e {
            return Err(HandlerError::bad_params("startTime must be before endTime"));
        }
    }
    ensure_exists(conn, "teachers", row.teacher_id.as_deref(), "teacher")?;
    ensure_exists(conn, "rooms", row.room_id.as_deref(), "room")?;
    Ok(())
}

fn load_class_row(conn: &Connection, class_id: &str) -> Result<Option<ClassRow>, HandlerError> {
    conn.query_row(
        "SELECT name, teacher_id, room_id, start_date, end_date, recurring_days, start_time, end_time
         FROM classes WHERE id = ?",
        [class_id],
        |r| {
            Ok(ClassRow {
                name: r.get(0)?,
                teacher_id: r.get(1)?,
                room_id: r.get(2)?,
                start_date: r.get(3)?,
                end_date: r.get(4)?,
                recurring_days: r.get(5)?,
                start_time: r.get(6)?,
                end_time: r.get(7)?,
            })
        },
    )
    .optional()
    .map_err(|e| HandlerError::db("db_query_failed", e))
}

fn weekday_indices(recurring_days: Option<&str>) -> Vec<u32> {
    recurring_days
        .and_then(|s| RecurringDays::from_value(&Value::String(s.to_string())))
        .map(|d| d.weekdays().indices())
        .unwrap_or_default()
}

fn handle_classes_list(
    state: &mut AppState,
    _req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let Ok(conn) = state.conn() else {
        return Ok(json!({ "classes": [] }));
    };

    let mut stmt = conn
        .prepare(
            "SELECT
               c.id,
               c.name,
               c.teacher_id,
               t.name,
               c.room_id,
               r.name,
               c.start_date,
               c.end_date,
               c.recurring_days,
               c.start_time,
               c.end_time
             FROM classes c
             LEFT JOIN teachers t ON t.id = c.teacher_id
             LEFT JOIN rooms r ON r.id = c.room_id
             ORDER BY c.name, c.id",
        )
        .map_err(|e| HandlerError::db("db_query_failed", e))?;

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let teacher_id: Option<String> = row.get(2)?;
            let teacher_name: Option<String> = row.get(3)?;
            let room_id: Option<String> = row.get(4)?;
            let room_name: Option<String> = row.get(5)?;
            let start_date: Option<String> = row.get(6)?;
            let end_date: Option<String> = row.get(7)?;
            let recurring_days: Option<String> = row.get(8)?;
            let start_time: Option<String> = row.get(9)?;
            let end_time: Option<String> = row.get(10)?;
            let weekdays = weekday_indices(recurring_days.as_deref());
            Ok(json!({
                "id": id,
                "name": name,
                "teacherId": teacher_id,
                "teacherName": teacher_name,
                "roomId": room_id,
                "roomName": room_name,
                "startDate": start_date,
                "endDate": end_date,
                "recurringDays": recurring_days,
                "weekdays": weekdays,
                "startTime": start_time,
                "endTime": end_time
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerError::db("db_query_failed", e))?;

    Ok(json!({ "classes": rows }))
}

fn handle_classes_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let conn = state.conn()?;
    let input = req
        .params
        .get("input")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerError::bad_params("input must be an object"))?;
    if !input.contains_key("name") {
        return Err(HandlerError::bad_params("missing name"));
    }

    let mut row = ClassRow::default();
    apply_class_patch(&mut row, input).map_err(HandlerError::BadParams)?;
    validate_class_row(conn, &row)?;

    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(
           id, name, teacher_id, room_id, start_date, end_date, recurring_days, start_time, end_time
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &class_id,
            &row.name,
            &row.teacher_id,
            &row.room_id,
            &row.start_date,
            &row.end_date,
            &row.recurring_days,
            &row.start_time,
            &row.end_time,
        ),
    )
    .map_err(|e| HandlerError::db("db_insert_failed", e))?;

    Ok(json!({ "classId": class_id, "name": row.name }))
}

fn handle_classes_update(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let conn = state.conn()?;
    let class_id = required_str(&req.params, "classId")?;
    let patch = req
        .params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerError::bad_params("patch must be an object"))?;

    let mut row = load_class_row(conn, &class_id)?.ok_or(HandlerError::NotFound("class"))?;
    apply_class_patch(&mut row, patch).map_err(HandlerError::BadParams)?;
    validate_class_row(conn, &row)?;

    conn.execute(
        "UPDATE classes SET
           name = ?, teacher_id = ?, room_id = ?, start_date = ?, end_date = ?,
           recurring_days = ?, start_time = ?, end_time = ?
         WHERE id = ?",
        (
            &row.name,
            &row.teacher_id,
            &row.room_id,
            &row.start_date,
            &row.end_date,
            &row.recurring_days,
            &row.start_time,
            &row.end_time,
            &class_id,
        ),
    )
    .map_err(|e| HandlerError::db("db_update_failed", e))?;

    Ok(json!({ "ok": true }))
}

fn handle_classes_delete(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let conn = state.conn()?;
    let class_id = required_str(&req.params, "classId")?;

    let changed = conn
        .execute("DELETE FROM classes WHERE id = ?", [&class_id])
        .map_err(|e| HandlerError::db("db_delete_failed", e))?;
    if changed == 0 {
        return Err(HandlerError::NotFound("class"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => handle_classes_list(state, req),
        "classes.create" => handle_classes_create(state, req),
        "classes.update" => handle_classes_update(state, req),
        "classes.delete" => handle_classes_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

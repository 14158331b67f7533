use crate::schedule::ClassDefinition;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Map, Value};
use std::path::Path;

pub const DB_FILE_NAME: &str = "school.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS rooms(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            teacher_id TEXT,
            room_id TEXT,
            start_date TEXT,
            end_date TEXT,
            recurring_days TEXT,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(room_id) REFERENCES rooms(id)
        )",
        [],
    )?;
    // Workspaces created before session times were tracked lack these columns.
    ensure_classes_time_columns(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_teacher ON classes(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_room ON classes(room_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_classes_time_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "classes", "start_time")? {
        conn.execute("ALTER TABLE classes ADD COLUMN start_time TEXT", [])?;
    }
    if !table_has_column(conn, "classes", "end_time")? {
        conn.execute("ALTER TABLE classes ADD COLUMN end_time TEXT", [])?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn insert_opt_str(extra: &mut Map<String, Value>, key: &str, v: Option<String>) {
    if let Some(s) = v {
        extra.insert(key.to_string(), Value::String(s));
    }
}

/// All stored classes as expander input, ordered by start date then name.
///
/// Stored text goes through the same lenient reading as caller-supplied
/// definitions, so a hand-edited row with a bad date is simply skipped later.
pub fn load_class_definitions(conn: &Connection) -> anyhow::Result<Vec<ClassDefinition>> {
    let mut stmt = conn.prepare(
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
         ORDER BY c.start_date IS NULL, c.start_date, c.name, c.id",
    )?;

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

            let mut extra = Map::new();
            extra.insert("name".into(), Value::String(name));
            insert_opt_str(&mut extra, "teacherName", teacher_name);
            insert_opt_str(&mut extra, "roomName", room_name);
            insert_opt_str(&mut extra, "startTime", start_time);
            insert_opt_str(&mut extra, "endTime", end_time);

            let mut raw = json!({
                "classId": id,
                "teacherId": teacher_id,
                "roomId": room_id,
                "startDate": start_date,
                "endDate": end_date,
                "recurringDays": recurring_days,
            });
            if let Some(obj) = raw.as_object_mut() {
                obj.extend(extra);
            }
            Ok(raw)
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut out = Vec::with_capacity(rows.len());
    for raw in rows {
        out.push(serde_json::from_value::<ClassDefinition>(raw)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_workspace(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    #[test]
    fn open_db_is_idempotent_and_migrates_time_columns() {
        let ws = temp_workspace("schoold-db-migrate");
        std::fs::create_dir_all(&ws).expect("mkdir");
        {
            let conn = Connection::open(ws.join(DB_FILE_NAME)).expect("open raw");
            conn.execute(
                "CREATE TABLE classes(
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    teacher_id TEXT,
                    room_id TEXT,
                    start_date TEXT,
                    end_date TEXT,
                    recurring_days TEXT
                )",
                [],
            )
            .expect("legacy classes table");
        }

        let conn = open_db(&ws).expect("open db");
        assert!(table_has_column(&conn, "classes", "start_time").expect("pragma"));
        assert!(table_has_column(&conn, "classes", "end_time").expect("pragma"));
        drop(conn);
        let _ = open_db(&ws).expect("reopen db");
    }

    #[test]
    fn settings_roundtrip_and_overwrite() {
        let ws = temp_workspace("schoold-db-settings");
        let conn = open_db(&ws).expect("open db");
        assert_eq!(settings_get_json(&conn, "setup.calendar").expect("get"), None);
        settings_set_json(&conn, "setup.calendar", &json!({ "paddingDays": 3 })).expect("set");
        settings_set_json(&conn, "setup.calendar", &json!({ "paddingDays": 5 })).expect("set");
        assert_eq!(
            settings_get_json(&conn, "setup.calendar").expect("get"),
            Some(json!({ "paddingDays": 5 }))
        );
    }

    #[test]
    fn class_definitions_carry_names_and_times() {
        let ws = temp_workspace("schoold-db-load");
        let conn = open_db(&ws).expect("open db");
        conn.execute("INSERT INTO teachers(id, name) VALUES('t1', 'Ms. Rivera')", [])
            .expect("teacher");
        conn.execute(
            "INSERT INTO classes(id, name, teacher_id, start_date, end_date, recurring_days, start_time)
             VALUES('c2', 'Biology', NULL, '2024-02-01', '2024-02-28', '1', NULL),
                   ('c1', 'Algebra', 't1', '2024-01-01', '2024-01-31', '2,4', '09:00'),
                   ('c3', 'Draft', NULL, NULL, NULL, NULL, NULL)",
            [],
        )
        .expect("classes");

        let defs = load_class_definitions(&conn).expect("load");
        let ids: Vec<&str> = defs.iter().filter_map(|d| d.class_id.as_deref()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);

        let algebra = &defs[0];
        assert_eq!(algebra.teacher_id.as_deref(), Some("t1"));
        assert_eq!(algebra.extra.get("teacherName"), Some(&json!("Ms. Rivera")));
        assert_eq!(algebra.extra.get("startTime"), Some(&json!("09:00")));
        assert_eq!(algebra.extra.get("roomName"), None);
        assert!(defs[2].start_date.is_none());
    }
}

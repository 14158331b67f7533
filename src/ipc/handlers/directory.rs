//! Teachers and rooms: the two lookup tables classes reference and the
//! calendar filters select from.

use crate::ipc::error::{respond, HandlerError};
use crate::ipc::params::{parse_name, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

#[derive(Clone, Copy)]
enum Directory {
    Teachers,
    Rooms,
}

impl Directory {
    fn parse_method(method: &str) -> Option<(Self, &str)> {
        let (family, action) = method.split_once('.')?;
        let dir = match family {
            "teachers" => Self::Teachers,
            "rooms" => Self::Rooms,
            _ => return None,
        };
        Some((dir, action))
    }

    fn table(self) -> &'static str {
        match self {
            Self::Teachers => "teachers",
            Self::Rooms => "rooms",
        }
    }

    /// Column on `classes` that references this table.
    fn class_column(self) -> &'static str {
        match self {
            Self::Teachers => "teacher_id",
            Self::Rooms => "room_id",
        }
    }

    fn id_key(self) -> &'static str {
        match self {
            Self::Teachers => "teacherId",
            Self::Rooms => "roomId",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Teachers => "teacher",
            Self::Rooms => "room",
        }
    }
}

fn handle_list(
    state: &mut AppState,
    dir: Directory,
) -> Result<serde_json::Value, HandlerError> {
    let Ok(conn) = state.conn() else {
        return Ok(json!({ dir.table(): [] }));
    };

    let sql = format!(
        "SELECT
           x.id,
           x.name,
           (SELECT COUNT(*) FROM classes c WHERE c.{col} = x.id) AS class_count
         FROM {table} x
         ORDER BY x.name, x.id",
        col = dir.class_column(),
        table = dir.table()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| HandlerError::db("db_query_failed", e))?;
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let class_count: i64 = row.get(2)?;
            Ok(json!({
                "id": id,
                "name": name,
                "classCount": class_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerError::db("db_query_failed", e))?;

    Ok(json!({ dir.table(): rows }))
}

fn handle_create(
    state: &mut AppState,
    req: &Request,
    dir: Directory,
) -> Result<serde_json::Value, HandlerError> {
    let conn = state.conn()?;
    let name = parse_name(
        req.params.get("name").unwrap_or(&serde_json::Value::Null),
        "name",
        120,
    )
    .map_err(HandlerError::BadParams)?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        &format!("INSERT INTO {}(id, name) VALUES(?, ?)", dir.table()),
        (&id, &name),
    )
    .map_err(|e| HandlerError::db("db_insert_failed", e))?;

    Ok(json!({ dir.id_key(): id, "name": name }))
}

fn handle_delete(
    state: &mut AppState,
    req: &Request,
    dir: Directory,
) -> Result<serde_json::Value, HandlerError> {
    let conn = state.conn()?;
    let id = required_str(&req.params, dir.id_key())?;

    let exists: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?", dir.table()),
            [&id],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| HandlerError::db("db_query_failed", e))?;
    if exists.is_none() {
        return Err(HandlerError::NotFound(dir.label()));
    }

    let class_count: i64 = conn
        .query_row(
            &format!(
                "SELECT COUNT(*) FROM classes WHERE {} = ?",
                dir.class_column()
            ),
            [&id],
            |r| r.get(0),
        )
        .map_err(|e| HandlerError::db("db_query_failed", e))?;
    if class_count > 0 {
        return Err(HandlerError::Conflict {
            message: format!("{} is assigned to classes", dir.label()),
            details: Some(json!({ "classCount": class_count })),
        });
    }

    conn.execute(&format!("DELETE FROM {} WHERE id = ?", dir.table()), [&id])
        .map_err(|e| HandlerError::db("db_delete_failed", e))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (dir, action) = Directory::parse_method(&req.method)?;
    let result = match action {
        "list" => handle_list(state, dir),
        "create" => handle_create(state, req, dir),
        "delete" => handle_delete(state, req, dir),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

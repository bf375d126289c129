use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_ts, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };

    // Include per-subject assignment counts so the UI can render the
    // subjects overview without a second round-trip.
    let mut stmt = match conn.prepare(
        "SELECT
           s.id,
           s.name,
           s.teacher_name,
           s.color,
           s.created_at,
           (SELECT COUNT(*) FROM assignments a WHERE a.subject_id = s.id) AS assignment_count,
           (SELECT COUNT(*) FROM assignments a WHERE a.subject_id = s.id AND a.completed = 0) AS open_count
         FROM subjects s
         ORDER BY s.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "teacherName": row.get::<_, Option<String>>(2)?,
                "color": row.get::<_, Option<String>>(3)?,
                "createdAt": row.get::<_, String>(4)?,
                "assignmentCount": row.get::<_, i64>(5)?,
                "openCount": row.get::<_, i64>(6)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_name = match parse_opt_string(req.params.get("teacherName")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("teacherName {}", m), None),
    };
    let color = match parse_opt_string(req.params.get("color")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("color {}", m), None),
    };

    let subject_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, name, teacher_name, color, created_at) VALUES(?, ?, ?, ?, ?)",
        params![subject_id, name, teacher_name, color, now_ts()],
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }

    ok(&req.id, json!({ "subjectId": subject_id, "name": name }))
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };

    let exists = match conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [&subject_id], |_r| Ok(()))
        .optional()
    {
        Ok(v) => v.is_some(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if !exists {
        return err(&req.id, "not_found", "subject not found", None);
    }

    let mut fields: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (k, v) in patch {
        match k.as_str() {
            "name" => {
                let Some(s) = v.as_str() else {
                    return err(&req.id, "bad_params", "patch.name must be string", None);
                };
                let s = s.trim();
                if s.is_empty() {
                    return err(&req.id, "bad_params", "patch.name must not be empty", None);
                }
                fields.push("name = ?".to_string());
                values.push(Value::Text(s.to_string()));
            }
            "teacherName" => {
                fields.push("teacher_name = ?".to_string());
                if v.is_null() {
                    values.push(Value::Null);
                } else if let Some(s) = v.as_str() {
                    values.push(Value::Text(s.trim().to_string()));
                } else {
                    return err(&req.id, "bad_params", "patch.teacherName must be string or null", None);
                }
            }
            "color" => {
                fields.push("color = ?".to_string());
                if v.is_null() {
                    values.push(Value::Null);
                } else if let Some(s) = v.as_str() {
                    values.push(Value::Text(s.trim().to_string()));
                } else {
                    return err(&req.id, "bad_params", "patch.color must be string or null", None);
                }
            }
            _ => return err(&req.id, "bad_params", format!("unknown patch field: {}", k), None),
        }
    }
    if fields.is_empty() {
        return ok(&req.id, json!({ "ok": true }));
    }
    values.push(Value::Text(subject_id));
    let sql = format!("UPDATE subjects SET {} WHERE id = ?", fields.join(", "));
    if let Err(e) = conn.execute(&sql, params_from_iter(values)) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [&subject_id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "subject not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Explicitly delete in dependency order (no ON DELETE CASCADE).
    if let Err(e) = tx.execute("DELETE FROM assignments WHERE subject_id = ?", [&subject_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "assignments" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM subjects WHERE id = ?", [&subject_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}

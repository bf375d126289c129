use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, now_ts, parse_bool, parse_opt_i64, parse_opt_instant_str, parse_opt_string,
    required_str, resolve_now,
};
use crate::ipc::types::{AppState, Request};
use crate::prioritize::{self, Assignment, Difficulty};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use serde_json::json;
use uuid::Uuid;

pub(crate) const SELECT_COLS: &str = "id, subject_id, title, description, due_date, estimated_time, \
     difficulty, priority, completed, allow_late_submission, max_points, created_at, updated_at";

pub(crate) fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: row.get(4)?,
        estimated_time: row.get(5)?,
        difficulty: row.get(6)?,
        priority: row.get(7)?,
        completed: row.get::<_, i64>(8)? != 0,
        allow_late_submission: row.get::<_, i64>(9)? != 0,
        max_points: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn to_json(a: &Assignment) -> serde_json::Value {
    serde_json::to_value(a).unwrap_or_else(|_| json!({}))
}

fn ensure_subject_exists(conn: &Connection, subject_id: &str) -> Result<bool, rusqlite::Error> {
    Ok(conn
        .query_row("SELECT 1 FROM subjects WHERE id = ? LIMIT 1", [subject_id], |_r| Ok(()))
        .optional()?
        .is_some())
}

/// Normalizes an incoming difficulty to its canonical lowercase spelling.
/// The web client sends "EASY"/"Easy"/"easy" depending on the screen.
fn canonical_difficulty(req: &Request, raw: &str, field: &str) -> Result<String, serde_json::Value> {
    match Difficulty::parse(raw) {
        Ok(d) => Ok(d.as_str().to_string()),
        Err(e) => Err(err(&req.id, "bad_params", format!("{}: {}", field, e.message), None)),
    }
}

fn validate_importance(req: &Request, v: i64, field: &str) -> Result<i64, serde_json::Value> {
    if (0..=100).contains(&v) {
        Ok(v)
    } else {
        Err(err(&req.id, "bad_params", format!("{} must be in 0..=100", field), None))
    }
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let subject_id = match parse_opt_string(req.params.get("subjectId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("subjectId {}", m), None),
    };
    let difficulty = match parse_opt_string(req.params.get("difficulty")) {
        Ok(None) => None,
        Ok(Some(raw)) => match canonical_difficulty(req, &raw, "difficulty") {
            Ok(v) => Some(v),
            Err(e) => return e,
        },
        Err(m) => return err(&req.id, "bad_params", format!("difficulty {}", m), None),
    };
    let completed = match req.params.get("completed") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_bool() {
            Some(b) => Some(b),
            None => return err(&req.id, "bad_params", "completed must be boolean or null", None),
        },
    };
    let due_after = match parse_opt_instant_str(req.params.get("dueAfter")) {
        Ok(v) => v.and_then(|s| prioritize::parse_instant(&s)),
        Err(m) => return err(&req.id, "bad_params", format!("dueAfter {}", m), None),
    };
    let due_before = match parse_opt_instant_str(req.params.get("dueBefore")) {
        Ok(v) => v.and_then(|s| prioritize::parse_instant(&s)),
        Err(m) => return err(&req.id, "bad_params", format!("dueBefore {}", m), None),
    };

    let mut where_clause = String::from("1 = 1");
    let mut values: Vec<Value> = Vec::new();
    if let Some(subject_id) = subject_id {
        where_clause.push_str(" AND subject_id = ?");
        values.push(Value::Text(subject_id));
    }
    if let Some(difficulty) = difficulty {
        where_clause.push_str(" AND difficulty = ?");
        values.push(Value::Text(difficulty));
    }
    if let Some(completed) = completed {
        where_clause.push_str(" AND completed = ?");
        values.push(Value::Integer(if completed { 1 } else { 0 }));
    }

    // Date-less assignments sort last so the "all" view still shows them.
    let sql = format!(
        "SELECT {} FROM assignments WHERE {} ORDER BY (due_date IS NULL), due_date, id",
        SELECT_COLS, where_clause
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let mut assignments = match stmt.query_map(params_from_iter(values), assignment_from_row) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Range filters compare parsed instants, not raw text, since stored due
    // dates mix plain dates and date-times. A range filter drops date-less rows.
    if due_after.is_some() || due_before.is_some() {
        assignments.retain(|a| {
            let Some(due) = a.due_date.as_deref().and_then(prioritize::parse_instant) else {
                return false;
            };
            if let Some(after) = due_after {
                if due < after {
                    return false;
                }
            }
            if let Some(before) = due_before {
                if due > before {
                    return false;
                }
            }
            true
        });
    }

    let items: Vec<serde_json::Value> = assignments.iter().map(to_json).collect();
    ok(&req.id, json!({ "assignments": items }))
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };

    let title = match input.get("title").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "input.title is required", None),
    };
    if title.is_empty() {
        return err(&req.id, "bad_params", "input.title must not be empty", None);
    }
    let description = match parse_opt_string(input.get("description")) {
        Ok(v) => v.unwrap_or_default(),
        Err(m) => return err(&req.id, "bad_params", format!("input.description {}", m), None),
    };
    let subject_id = match parse_opt_string(input.get("subjectId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.subjectId {}", m), None),
    };
    if let Some(ref sid) = subject_id {
        match ensure_subject_exists(conn, sid) {
            Ok(true) => {}
            Ok(false) => return err(&req.id, "not_found", "subject not found", None),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    let due_date = match parse_opt_instant_str(input.get("dueDate")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.dueDate {}", m), None),
    };
    let estimated_time = match input.get("estimatedTime").and_then(|v| v.as_i64()) {
        Some(v) if v >= 0 => v,
        Some(_) => return err(&req.id, "bad_params", "input.estimatedTime must be >= 0", None),
        None => return err(&req.id, "bad_params", "input.estimatedTime is required", None),
    };
    let difficulty = match input.get("difficulty").and_then(|v| v.as_str()) {
        Some(raw) => match canonical_difficulty(req, raw, "input.difficulty") {
            Ok(v) => v,
            Err(e) => return e,
        },
        None => return err(&req.id, "bad_params", "input.difficulty is required", None),
    };
    let priority = match parse_opt_i64(input.get("priority")) {
        Ok(Some(v)) => match validate_importance(req, v, "input.priority") {
            Ok(v) => Some(v),
            Err(e) => return e,
        },
        Ok(None) => None,
        Err(m) => return err(&req.id, "bad_params", format!("input.priority {}", m), None),
    };
    let completed = match parse_bool(input.get("completed"), false) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.completed {}", m), None),
    };
    let allow_late = match parse_bool(input.get("allowLateSubmission"), false) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.allowLateSubmission {}", m), None),
    };
    let max_points = match parse_opt_i64(input.get("maxPoints")) {
        Ok(Some(v)) if v > 0 => Some(v),
        Ok(Some(_)) => return err(&req.id, "bad_params", "input.maxPoints must be > 0", None),
        Ok(None) => None,
        Err(m) => return err(&req.id, "bad_params", format!("input.maxPoints {}", m), None),
    };

    let assignment_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "INSERT INTO assignments(
            id, subject_id, title, description, due_date, estimated_time, difficulty,
            priority, completed, allow_late_submission, max_points, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            assignment_id,
            subject_id,
            title,
            description,
            due_date,
            estimated_time,
            difficulty,
            priority,
            if completed { 1 } else { 0 },
            if allow_late { 1 } else { 0 },
            max_points,
            ts,
            ts
        ],
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assignments" })),
        );
    }
    ok(&req.id, json!({ "assignmentId": assignment_id }))
}

fn handle_assignments_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sql = format!("SELECT {} FROM assignments WHERE id = ?", SELECT_COLS);
    match conn
        .query_row(&sql, [&assignment_id], assignment_from_row)
        .optional()
    {
        Ok(Some(a)) => ok(&req.id, json!({ "assignment": to_json(&a) })),
        Ok(None) => err(&req.id, "not_found", "assignment not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_assignments_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };

    let exists = match conn
        .query_row("SELECT 1 FROM assignments WHERE id = ?", [&assignment_id], |_r| Ok(()))
        .optional()
    {
        Ok(v) => v.is_some(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if !exists {
        return err(&req.id, "not_found", "assignment not found", None);
    }

    let mut fields: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (k, v) in patch {
        match k.as_str() {
            "title" => {
                let Some(s) = v.as_str() else {
                    return err(&req.id, "bad_params", "patch.title must be string", None);
                };
                let s = s.trim();
                if s.is_empty() {
                    return err(&req.id, "bad_params", "patch.title must not be empty", None);
                }
                fields.push("title = ?".to_string());
                values.push(Value::Text(s.to_string()));
            }
            "description" => {
                let Some(s) = v.as_str() else {
                    return err(&req.id, "bad_params", "patch.description must be string", None);
                };
                fields.push("description = ?".to_string());
                values.push(Value::Text(s.to_string()));
            }
            "subjectId" => {
                fields.push("subject_id = ?".to_string());
                if v.is_null() {
                    values.push(Value::Null);
                } else if let Some(sid) = v.as_str() {
                    let sid = sid.trim().to_string();
                    match ensure_subject_exists(conn, &sid) {
                        Ok(true) => values.push(Value::Text(sid)),
                        Ok(false) => return err(&req.id, "not_found", "subject not found", None),
                        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
                    }
                } else {
                    return err(&req.id, "bad_params", "patch.subjectId must be string or null", None);
                }
            }
            "dueDate" => {
                fields.push("due_date = ?".to_string());
                match parse_opt_instant_str(Some(v)) {
                    Ok(Some(s)) => values.push(Value::Text(s)),
                    Ok(None) => values.push(Value::Null),
                    Err(m) => return err(&req.id, "bad_params", format!("patch.dueDate {}", m), None),
                }
            }
            "estimatedTime" => {
                let Some(n) = v.as_i64() else {
                    return err(&req.id, "bad_params", "patch.estimatedTime must be integer", None);
                };
                if n < 0 {
                    return err(&req.id, "bad_params", "patch.estimatedTime must be >= 0", None);
                }
                fields.push("estimated_time = ?".to_string());
                values.push(Value::Integer(n));
            }
            "difficulty" => {
                let Some(raw) = v.as_str() else {
                    return err(&req.id, "bad_params", "patch.difficulty must be string", None);
                };
                match canonical_difficulty(req, raw, "patch.difficulty") {
                    Ok(canonical) => {
                        fields.push("difficulty = ?".to_string());
                        values.push(Value::Text(canonical));
                    }
                    Err(e) => return e,
                }
            }
            "priority" => {
                fields.push("priority = ?".to_string());
                if v.is_null() {
                    values.push(Value::Null);
                } else if let Some(n) = v.as_i64() {
                    match validate_importance(req, n, "patch.priority") {
                        Ok(n) => values.push(Value::Integer(n)),
                        Err(e) => return e,
                    }
                } else {
                    return err(&req.id, "bad_params", "patch.priority must be integer or null", None);
                }
            }
            "completed" => {
                let Some(b) = v.as_bool() else {
                    return err(&req.id, "bad_params", "patch.completed must be boolean", None);
                };
                fields.push("completed = ?".to_string());
                values.push(Value::Integer(if b { 1 } else { 0 }));
            }
            "allowLateSubmission" => {
                let Some(b) = v.as_bool() else {
                    return err(&req.id, "bad_params", "patch.allowLateSubmission must be boolean", None);
                };
                fields.push("allow_late_submission = ?".to_string());
                values.push(Value::Integer(if b { 1 } else { 0 }));
            }
            "maxPoints" => {
                fields.push("max_points = ?".to_string());
                if v.is_null() {
                    values.push(Value::Null);
                } else if let Some(n) = v.as_i64() {
                    if n <= 0 {
                        return err(&req.id, "bad_params", "patch.maxPoints must be > 0", None);
                    }
                    values.push(Value::Integer(n));
                } else {
                    return err(&req.id, "bad_params", "patch.maxPoints must be integer or null", None);
                }
            }
            _ => return err(&req.id, "bad_params", format!("unknown patch field: {}", k), None),
        }
    }
    if fields.is_empty() {
        return ok(&req.id, json!({ "ok": true }));
    }
    fields.push("updated_at = ?".to_string());
    values.push(Value::Text(now_ts()));
    values.push(Value::Text(assignment_id));
    let sql = format!(
        "UPDATE assignments SET {} WHERE id = ?",
        fields.join(", ")
    );
    if let Err(e) = conn.execute(&sql, params_from_iter(values)) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_assignments_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let completed = match parse_bool(req.params.get("completed"), true) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("completed {}", m), None),
    };
    match conn.execute(
        "UPDATE assignments SET completed = ?, updated_at = ? WHERE id = ?",
        params![if completed { 1 } else { 0 }, now_ts(), assignment_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "assignment not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_assignments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM assignments WHERE id = ?", [&assignment_id]) {
        Ok(0) => err(&req.id, "not_found", "assignment not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

/// Smart-sorted listing: every dated assignment with its score breakdown,
/// stable-sorted by descending total. Date-less rows cannot be scored and
/// are excluded here; the response reports how many were left out.
fn handle_assignments_prioritized(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let now = match resolve_now(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let include_completed = match parse_bool(req.params.get("includeCompleted"), false) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("includeCompleted {}", m), None),
    };

    let mut where_clause = String::from("due_date IS NOT NULL");
    if !include_completed {
        where_clause.push_str(" AND completed = 0");
    }
    // Pre-sort order is insertion order, so equal-score rows keep a stable,
    // reproducible position across refreshes.
    let sql = format!(
        "SELECT {} FROM assignments WHERE {} ORDER BY rowid",
        SELECT_COLS, where_clause
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let assignments = match stmt.query_map([], assignment_from_row) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let undated_sql = if include_completed {
        "SELECT COUNT(*) FROM assignments WHERE due_date IS NULL"
    } else {
        "SELECT COUNT(*) FROM assignments WHERE due_date IS NULL AND completed = 0"
    };
    let undated_excluded: i64 = match conn.query_row(undated_sql, [], |r| r.get(0)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let scored = match prioritize::sort_by_priority(&assignments, now) {
        Ok(v) => v,
        Err(e) => return err(&req.id, &e.code, e.message, None),
    };
    let items: Vec<serde_json::Value> = scored
        .iter()
        .map(|(a, score)| {
            json!({
                "assignment": to_json(a),
                "score": score,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({ "assignments": items, "undatedExcluded": undated_excluded }),
    )
}

/// Tab buckets for the assignments view, relative to the supplied (or
/// current) instant. dueToday overlaps dueThisWeek by design.
fn handle_assignments_buckets(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let now = match resolve_now(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sql = format!(
        "SELECT {} FROM assignments ORDER BY (due_date IS NULL), due_date, id",
        SELECT_COLS
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let assignments = match stmt.query_map([], assignment_from_row) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let buckets = prioritize::categorize(&assignments, now);
    let counts = json!({
        "overdue": buckets.overdue.len(),
        "dueToday": buckets.due_today.len(),
        "dueThisWeek": buckets.due_this_week.len(),
        "upcoming": buckets.upcoming.len(),
        "completed": buckets.completed.len(),
        "undated": buckets.undated.len(),
    });
    match serde_json::to_value(&buckets) {
        Ok(mut value) => {
            if let Some(obj) = value.as_object_mut() {
                obj.insert("counts".to_string(), counts);
            }
            ok(&req.id, value)
        }
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_assignments_list(state, req)),
        "assignments.create" => Some(handle_assignments_create(state, req)),
        "assignments.open" => Some(handle_assignments_open(state, req)),
        "assignments.update" => Some(handle_assignments_update(state, req)),
        "assignments.complete" => Some(handle_assignments_complete(state, req)),
        "assignments.delete" => Some(handle_assignments_delete(state, req)),
        "assignments.prioritized" => Some(handle_assignments_prioritized(state, req)),
        "assignments.buckets" => Some(handle_assignments_buckets(state, req)),
        _ => None,
    }
}

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, now_ts, parse_bool, parse_opt_instant_str, parse_opt_string, required_str, resolve_now,
};
use crate::ipc::types::{AppState, Request};
use crate::prioritize::{self, Notification, NotificationTier};
use rusqlite::{params, Connection, Row};
use serde_json::json;
use uuid::Uuid;

const SELECT_COLS: &str =
    "id, kind, title, message, priority, read, snoozed_until, action_url, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        kind: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        priority: row.get(4)?,
        read: row.get::<_, i64>(5)? != 0,
        snoozed_until: row.get(6)?,
        action_url: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn to_json(n: &Notification) -> serde_json::Value {
    serde_json::to_value(n).unwrap_or_else(|_| json!({}))
}

fn unread_count(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("SELECT COUNT(*) FROM notifications WHERE read = 0", [], |r| r.get(0))
}

fn handle_notifications_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "notifications": [], "unreadCount": 0 }));
    };
    let unread_only = match parse_bool(req.params.get("unreadOnly"), false) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("unreadOnly {}", m), None),
    };

    let sql = if unread_only {
        format!(
            "SELECT {} FROM notifications WHERE read = 0 ORDER BY created_at DESC, id",
            SELECT_COLS
        )
    } else {
        format!(
            "SELECT {} FROM notifications ORDER BY created_at DESC, id",
            SELECT_COLS
        )
    };
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let notifications = match stmt.query_map([], notification_from_row) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let unread = match unread_count(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let items: Vec<serde_json::Value> = notifications.iter().map(to_json).collect();
    ok(&req.id, json!({ "notifications": items, "unreadCount": unread }))
}

fn handle_notifications_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let message = match parse_opt_string(input.get("message")) {
        Ok(v) => v.unwrap_or_default(),
        Err(m) => return err(&req.id, "bad_params", format!("input.message {}", m), None),
    };
    let kind = match parse_opt_string(input.get("kind")) {
        Ok(v) => v.unwrap_or_else(|| "announcement".to_string()),
        Err(m) => return err(&req.id, "bad_params", format!("input.kind {}", m), None),
    };
    let priority = match input.get("priority").and_then(|v| v.as_str()) {
        Some(raw) => match NotificationTier::parse(raw) {
            Some(tier) => tier.as_str().to_string(),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("input.priority must be one of: low, medium, high (got {})", raw),
                    None,
                )
            }
        },
        None => return err(&req.id, "bad_params", "input.priority is required", None),
    };
    let action_url = match parse_opt_string(input.get("actionUrl")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.actionUrl {}", m), None),
    };
    // Backdatable so deadline reminders created by a sync job keep their
    // original delivery time; defaults to the present.
    let created_at = match parse_opt_instant_str(input.get("createdAt")) {
        Ok(v) => v.unwrap_or_else(now_ts),
        Err(m) => return err(&req.id, "bad_params", format!("input.createdAt {}", m), None),
    };

    let notification_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO notifications(
            id, kind, title, message, priority, read, snoozed_until, action_url, created_at
         ) VALUES(?, ?, ?, ?, ?, 0, NULL, ?, ?)",
        params![notification_id, kind, title, message, priority, action_url, created_at],
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "notifications" })),
        );
    }
    ok(&req.id, json!({ "notificationId": notification_id }))
}

fn handle_notifications_mark_read(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let notification_id = match required_str(req, "notificationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?",
        [&notification_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "notification not found", None),
        Ok(_) => {
            let unread = match unread_count(conn) {
                Ok(v) => v,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
            ok(&req.id, json!({ "ok": true, "unreadCount": unread }))
        }
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_notifications_mark_all_read(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match conn.execute("UPDATE notifications SET read = 1 WHERE read = 0", []) {
        Ok(updated) => ok(&req.id, json!({ "ok": true, "marked": updated })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_notifications_snooze(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let notification_id = match required_str(req, "notificationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // `snoozedUntil: null` clears the snooze.
    let snoozed_until = match parse_opt_instant_str(req.params.get("snoozedUntil")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("snoozedUntil {}", m), None),
    };
    match conn.execute(
        "UPDATE notifications SET snoozed_until = ? WHERE id = ?",
        params![snoozed_until, notification_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "notification not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_notifications_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let notification_id = match required_str(req, "notificationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM notifications WHERE id = ?", [&notification_id]) {
        Ok(0) => err(&req.id, "not_found", "notification not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

/// Unread, unsnoozed notifications whose tier cooldown has elapsed at `now`.
/// The UI polls this to decide which delivered notifications to re-show.
fn handle_notifications_resurface(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let now = match resolve_now(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sql = format!(
        "SELECT {} FROM notifications WHERE read = 0 ORDER BY created_at DESC, id",
        SELECT_COLS
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let unread = match stmt.query_map([], notification_from_row) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let items: Vec<serde_json::Value> = unread
        .iter()
        .filter(|n| prioritize::should_resurface(n, now))
        .map(to_json)
        .collect();
    ok(&req.id, json!({ "notifications": items }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notifications.list" => Some(handle_notifications_list(state, req)),
        "notifications.create" => Some(handle_notifications_create(state, req)),
        "notifications.markRead" => Some(handle_notifications_mark_read(state, req)),
        "notifications.markAllRead" => Some(handle_notifications_mark_all_read(state, req)),
        "notifications.snooze" => Some(handle_notifications_snooze(state, req)),
        "notifications.delete" => Some(handle_notifications_delete(state, req)),
        "notifications.resurface" => Some(handle_notifications_resurface(state, req)),
        _ => None,
    }
}

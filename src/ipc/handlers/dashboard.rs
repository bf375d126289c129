use super::assignments::{assignment_from_row, SELECT_COLS};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, resolve_now};
use crate::ipc::types::{AppState, Request};
use crate::prioritize;
use serde_json::json;

/// Headline numbers for the student dashboard, derived from the workspace
/// rather than reported by the client: open assignments inside the current
/// week window, overall completion rate, remaining estimated study time,
/// and the unread notification count.
fn handle_dashboard_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let now = match resolve_now(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let sql = format!("SELECT {} FROM assignments", SELECT_COLS);
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
    let due_this_week = buckets.overdue.len() + buckets.due_this_week.len();

    let total = assignments.len();
    let completed = buckets.completed.len();
    let completion_rate = if total > 0 {
        ((completed as f64 / total as f64) * 1000.0).round() / 10.0
    } else {
        0.0
    };
    let study_time_minutes: i64 = assignments
        .iter()
        .filter(|a| !a.completed)
        .map(|a| a.estimated_time)
        .sum();

    let unread_notifications: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE read = 0",
        [],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "assignmentsDueThisWeek": due_this_week,
            "completionRate": completion_rate,
            "studyTimeMinutes": study_time_minutes,
            "unreadNotifications": unread_notifications,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.stats" => Some(handle_dashboard_stats(state, req)),
        _ => None,
    }
}

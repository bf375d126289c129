
use serde_json::json;
use test_support::{request_err, request_ok, select_workspace, spawn_sidecar, temp_dir};

#[test]
fn assignment_lifecycle_create_update_complete_delete() {
    let workspace = temp_dir("echolearn-assignments-crud");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.create",
        json!({
            "input": {
                "title": "Chapter 4 problems",
                "description": "Odd-numbered questions",
                "dueDate": "2026-04-02",
                "difficulty": "Medium",
                "estimatedTime": 120,
                "maxPoints": 40
            }
        }),
    );
    let assignment_id = created
        .get("assignmentId")
        .and_then(|v| v.as_str())
        .expect("assignmentId")
        .to_string();

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "assignments.open",
        json!({ "assignmentId": assignment_id }),
    );
    let a = opened.get("assignment").expect("assignment");
    assert_eq!(a.get("title").and_then(|v| v.as_str()), Some("Chapter 4 problems"));
    // Mixed-case input is stored canonical lowercase.
    assert_eq!(a.get("difficulty").and_then(|v| v.as_str()), Some("medium"));
    assert_eq!(a.get("completed").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(a.get("maxPoints").and_then(|v| v.as_i64()), Some(40));
    assert!(a.get("priority").map(|v| v.is_null()).unwrap_or(false));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.update",
        json!({
            "assignmentId": assignment_id,
            "patch": {
                "difficulty": "HARD",
                "priority": 75,
                "dueDate": "2026-04-05T17:00:00"
            }
        }),
    );
    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.open",
        json!({ "assignmentId": assignment_id }),
    );
    let a = reopened.get("assignment").expect("assignment");
    assert_eq!(a.get("difficulty").and_then(|v| v.as_str()), Some("hard"));
    assert_eq!(a.get("priority").and_then(|v| v.as_i64()), Some(75));
    assert_eq!(a.get("dueDate").and_then(|v| v.as_str()), Some("2026-04-05T17:00:00"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.complete",
        json!({ "assignmentId": assignment_id }),
    );
    let completed_view = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "assignments.list",
        json!({ "completed": true }),
    );
    assert_eq!(
        completed_view
            .get("assignments")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    // complete is a toggle: re-open the assignment.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "assignments.complete",
        json!({ "assignmentId": assignment_id, "completed": false }),
    );
    let open_view = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "assignments.list",
        json!({ "completed": false }),
    );
    assert_eq!(
        open_view
            .get("assignments")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "assignments.delete",
        json!({ "assignmentId": assignment_id }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "assignments.open",
        json!({ "assignmentId": assignment_id }),
    );
    assert_eq!(code, "not_found");
}

#[test]
fn create_rejects_malformed_input() {
    let workspace = temp_dir("echolearn-assignments-validation");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    // Unknown difficulty must not silently default.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.create",
        json!({
            "input": {
                "title": "Mystery work",
                "difficulty": "impossible",
                "estimatedTime": 30
            }
        }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "assignments.create",
        json!({
            "input": {
                "title": "Bad date",
                "difficulty": "easy",
                "estimatedTime": 30,
                "dueDate": "sometime next week"
            }
        }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.create",
        json!({
            "input": {
                "title": "Overweighted",
                "difficulty": "easy",
                "estimatedTime": 30,
                "priority": 150
            }
        }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.create",
        json!({
            "input": {
                "title": "Negative minutes",
                "difficulty": "easy",
                "estimatedTime": -5
            }
        }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.create",
        json!({
            "input": {
                "title": "Orphan",
                "difficulty": "easy",
                "estimatedTime": 30,
                "subjectId": "missing-subject"
            }
        }),
    );
    assert_eq!(code, "not_found");
}

#[test]
fn list_filters_compose() {
    let workspace = temp_dir("echolearn-assignments-filters");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "subjects.create",
        json!({ "name": "Mathematics" }),
    );
    let subject_id = subject
        .get("subjectId")
        .and_then(|v| v.as_str())
        .expect("subjectId")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "assignments.create",
        json!({
            "input": {
                "title": "Math worksheet",
                "subjectId": subject_id,
                "dueDate": "2026-03-11",
                "difficulty": "easy",
                "estimatedTime": 20
            }
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.create",
        json!({
            "input": {
                "title": "History essay",
                "dueDate": "2026-03-20",
                "difficulty": "hard",
                "estimatedTime": 200
            }
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.create",
        json!({
            "input": {
                "title": "Unscheduled drill",
                "difficulty": "easy",
                "estimatedTime": 10
            }
        }),
    );

    let by_subject = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.list",
        json!({ "subjectId": subject_id }),
    );
    assert_eq!(
        by_subject
            .get("assignments")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    // Filter value casing is normalized the same way stored rows are.
    let by_difficulty = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "assignments.list",
        json!({ "difficulty": "HARD" }),
    );
    let items = by_difficulty
        .get("assignments")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("assignments");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("title").and_then(|v| v.as_str()), Some("History essay"));

    // Date ranges drop date-less rows; the plain list keeps them last.
    let in_range = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "assignments.list",
        json!({ "dueAfter": "2026-03-10", "dueBefore": "2026-03-15" }),
    );
    let items = in_range
        .get("assignments")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("assignments");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("title").and_then(|v| v.as_str()), Some("Math worksheet"));

    let all = request_ok(&mut stdin, &mut reader, "8", "assignments.list", json!({}));
    let titles: Vec<&str> = all
        .get("assignments")
        .and_then(|v| v.as_array())
        .expect("assignments")
        .iter()
        .filter_map(|a| a.get("title").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(titles, vec!["Math worksheet", "History essay", "Unscheduled drill"]);
}

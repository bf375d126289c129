
use serde_json::json;
use test_support::{request_ok, select_workspace, spawn_sidecar, temp_dir};

#[test]
fn prioritized_listing_orders_by_score_and_reports_factors() {
    let workspace = temp_dir("echolearn-priority-scoring");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    // Fixed clock so the score ladder is deterministic.
    let now = "2026-03-10T08:00:00";

    // Due in 10h, hard, 180 min, weight 88 -> total 98.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.create",
        json!({
            "input": {
                "title": "Physics lab report",
                "dueDate": "2026-03-10T18:00:00",
                "difficulty": "hard",
                "estimatedTime": 180,
                "priority": 88
            }
        }),
    );
    // Due in 200h, easy, 60 min, default weight -> total 30.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "assignments.create",
        json!({
            "input": {
                "title": "Vocabulary list",
                "dueDate": "2026-03-18T16:00:00",
                "difficulty": "EASY",
                "estimatedTime": 60
            }
        }),
    );
    // No due date: excluded from the prioritized view.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.create",
        json!({
            "input": {
                "title": "Optional reading",
                "difficulty": "easy",
                "estimatedTime": 30
            }
        }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.prioritized",
        json!({ "now": now }),
    );
    let items = result
        .get("assignments")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("assignments array");
    assert_eq!(items.len(), 2);
    assert_eq!(result.get("undatedExcluded").and_then(|v| v.as_i64()), Some(1));

    let first = &items[0];
    assert_eq!(
        first.pointer("/assignment/title").and_then(|v| v.as_str()),
        Some("Physics lab report")
    );
    assert_eq!(first.pointer("/score/total").and_then(|v| v.as_i64()), Some(98));
    assert_eq!(first.pointer("/score/urgency").and_then(|v| v.as_f64()), Some(100.0));
    assert_eq!(first.pointer("/score/difficulty").and_then(|v| v.as_f64()), Some(100.0));
    assert_eq!(first.pointer("/score/timeFactor").and_then(|v| v.as_f64()), Some(100.0));
    assert_eq!(first.pointer("/score/importance").and_then(|v| v.as_f64()), Some(88.0));

    let second = &items[1];
    assert_eq!(
        second.pointer("/assignment/title").and_then(|v| v.as_str()),
        Some("Vocabulary list")
    );
    assert_eq!(second.pointer("/score/total").and_then(|v| v.as_i64()), Some(30));
    assert_eq!(second.pointer("/score/urgency").and_then(|v| v.as_f64()), Some(20.0));
    assert_eq!(second.pointer("/score/importance").and_then(|v| v.as_f64()), Some(50.0));
}

#[test]
fn equal_scores_preserve_creation_order() {
    let workspace = temp_dir("echolearn-priority-stability");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    // Three clones with identical inputs; only creation order can break ties.
    for (i, title) in ["twin-a", "twin-b", "twin-c"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("{}", i + 1),
            "assignments.create",
            json!({
                "input": {
                    "title": title,
                    "dueDate": "2026-03-11T09:00:00",
                    "difficulty": "medium",
                    "estimatedTime": 90,
                    "priority": 40
                }
            }),
        );
    }

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.prioritized",
        json!({ "now": "2026-03-10T08:00:00" }),
    );
    let titles: Vec<String> = result
        .get("assignments")
        .and_then(|v| v.as_array())
        .expect("assignments array")
        .iter()
        .filter_map(|item| {
            item.pointer("/assignment/title")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        })
        .collect();
    assert_eq!(titles, vec!["twin-a", "twin-b", "twin-c"]);
}

#[test]
fn completed_assignments_stay_out_unless_requested() {
    let workspace = temp_dir("echolearn-priority-completed");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.create",
        json!({
            "input": {
                "title": "Finished essay",
                "dueDate": "2026-03-11T09:00:00",
                "difficulty": "medium",
                "estimatedTime": 60,
                "completed": true
            }
        }),
    );
    let _ = created;

    let default_view = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "assignments.prioritized",
        json!({ "now": "2026-03-10T08:00:00" }),
    );
    assert_eq!(
        default_view
            .get("assignments")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );

    let with_completed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.prioritized",
        json!({ "now": "2026-03-10T08:00:00", "includeCompleted": true }),
    );
    assert_eq!(
        with_completed
            .get("assignments")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );
}

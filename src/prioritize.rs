use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Assignment record as read from the workspace DB. `due_date` keeps the
/// ISO text the caller supplied; parsing happens at scoring/bucketing time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    pub description: String,
    pub subject_id: Option<String>,
    pub due_date: Option<String>,
    pub estimated_time: i64,
    pub difficulty: String,
    pub priority: Option<i64>,
    pub completed: bool,
    pub allow_late_submission: bool,
    pub max_points: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub read: bool,
    pub snoozed_until: Option<String>,
    pub action_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreError {
    pub code: String,
    pub message: String,
}

impl ScoreError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Case-insensitive parse. The UI sends "EASY", "Easy" and "easy"
    /// interchangeably; anything else is rejected rather than defaulted,
    /// since a silent default would skew the score.
    pub fn parse(raw: &str) -> Result<Difficulty, ScoreError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ScoreError::new(
                "bad_difficulty",
                format!("unknown difficulty: {}", other),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    fn factor(self) -> f64 {
        match self {
            Difficulty::Easy => 30.0,
            Difficulty::Medium => 60.0,
            Difficulty::Hard => 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTier {
    Low,
    Medium,
    High,
}

impl NotificationTier {
    pub fn parse(raw: &str) -> Option<NotificationTier> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(NotificationTier::Low),
            "medium" => Some(NotificationTier::Medium),
            "high" => Some(NotificationTier::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationTier::Low => "low",
            NotificationTier::Medium => "medium",
            NotificationTier::High => "high",
        }
    }

    /// Hours a delivered-but-unread notification must age before it is
    /// shown again.
    fn resurface_after_hours(self) -> f64 {
        match self {
            NotificationTier::High => 4.0,
            NotificationTier::Medium => 12.0,
            NotificationTier::Low => 24.0,
        }
    }
}

/// Parses the timestamp formats the portal sends: an RFC3339-ish local
/// date-time (optional fractional seconds, optional trailing Z) or a plain
/// `YYYY-MM-DD`, which means local midnight.
pub fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    let t = raw.trim().trim_end_matches('Z');
    if let Ok(dt) = NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityScore {
    pub total: i64,
    pub urgency: f64,
    pub difficulty: f64,
    pub time_factor: f64,
    pub importance: f64,
}

/// Urgency ladder over hours-until-due. First match wins; an overdue
/// assignment has negative hours and lands in the `< 24` rung, scoring the
/// same 100 as "due very soon".
fn urgency_factor(hours_until_due: f64) -> f64 {
    if hours_until_due < 24.0 {
        100.0
    } else if hours_until_due < 48.0 {
        80.0
    } else if hours_until_due < 72.0 {
        60.0
    } else if hours_until_due < 168.0 {
        40.0
    } else {
        20.0
    }
}

/// Weighted 0-100 urgency score for a single assignment. Pure: `now` is
/// injected, the input is never mutated, and equal inputs give equal output.
///
/// Date-less assignments are rejected; callers that sort mixed lists filter
/// them out first (they are excluded from every date-driven view anyway).
pub fn priority_score(a: &Assignment, now: NaiveDateTime) -> Result<PriorityScore, ScoreError> {
    let due_raw = a
        .due_date
        .as_deref()
        .ok_or_else(|| ScoreError::new("missing_due_date", "assignment has no due date"))?;
    let due = parse_instant(due_raw).ok_or_else(|| {
        ScoreError::new("bad_due_date", format!("unparseable due date: {}", due_raw))
    })?;
    let difficulty = Difficulty::parse(&a.difficulty)?;

    let hours_until_due = (due - now).num_seconds() as f64 / 3600.0;
    let urgency = urgency_factor(hours_until_due);
    let difficulty = difficulty.factor();
    let time_factor = ((a.estimated_time as f64 / 180.0) * 100.0).min(100.0);
    let importance = a.priority.unwrap_or(50) as f64;

    let total =
        (urgency * 0.4 + difficulty * 0.25 + time_factor * 0.2 + importance * 0.15).round() as i64;

    Ok(PriorityScore {
        total,
        urgency,
        difficulty,
        time_factor,
        importance,
    })
}

/// Stable sort by descending total score. Ties keep input order, so two
/// identical assignments never swap between refreshes.
pub fn sort_by_priority(
    assignments: &[Assignment],
    now: NaiveDateTime,
) -> Result<Vec<(Assignment, PriorityScore)>, ScoreError> {
    let mut scored = Vec::with_capacity(assignments.len());
    for a in assignments {
        let score = priority_score(a, now)?;
        scored.push((a.clone(), score));
    }
    scored.sort_by(|a, b| b.1.total.cmp(&a.1.total));
    Ok(scored)
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentBuckets {
    pub overdue: Vec<Assignment>,
    pub due_today: Vec<Assignment>,
    pub due_this_week: Vec<Assignment>,
    pub upcoming: Vec<Assignment>,
    pub completed: Vec<Assignment>,
    pub undated: Vec<Assignment>,
}

/// Partitions assignments into the portal's tab buckets relative to `now`.
///
/// `completed` is orthogonal and pulls from the full set. For the rest,
/// `today` is `now` truncated to midnight: strictly-before-today is overdue,
/// the same calendar day is dueToday, within `today ..= today + 7d` is
/// dueThisWeek, later is upcoming. An assignment due today satisfies both
/// the dueToday and dueThisWeek predicates; the UI renders one tab at a
/// time, so the overlap is kept as-is instead of forcing disjoint sets.
pub fn categorize(assignments: &[Assignment], now: NaiveDateTime) -> AssignmentBuckets {
    let today = now.date().and_time(NaiveTime::MIN);
    let week_end = today + ChronoDuration::days(7);

    let mut buckets = AssignmentBuckets::default();
    for a in assignments {
        if a.completed {
            buckets.completed.push(a.clone());
            continue;
        }
        let due = a.due_date.as_deref().and_then(parse_instant);
        let Some(due) = due else {
            buckets.undated.push(a.clone());
            continue;
        };
        if due < today {
            buckets.overdue.push(a.clone());
            continue;
        }
        if due.date() == now.date() {
            buckets.due_today.push(a.clone());
        }
        if due <= week_end {
            buckets.due_this_week.push(a.clone());
        } else {
            buckets.upcoming.push(a.clone());
        }
    }
    buckets
}

/// Whether a delivered, still-unread notification should be shown again.
/// Read or actively-snoozed notifications never resurface; otherwise the
/// tier cooldown applies, and once crossed the notification stays eligible
/// until it is read or re-snoozed.
pub fn should_resurface(n: &Notification, now: NaiveDateTime) -> bool {
    if n.read {
        return false;
    }
    if let Some(snoozed) = n.snoozed_until.as_deref().and_then(parse_instant) {
        if snoozed > now {
            return false;
        }
    }
    let Some(tier) = NotificationTier::parse(&n.priority) else {
        return false;
    };
    let Some(created) = parse_instant(&n.created_at) else {
        return false;
    };
    let hours_since_created = (now - created).num_seconds() as f64 / 3600.0;
    hours_since_created >= tier.resurface_after_hours()
}

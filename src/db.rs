use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("echolearn.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            teacher_name TEXT,
            color TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            subject_id TEXT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            due_date TEXT,
            estimated_time INTEGER NOT NULL,
            difficulty TEXT NOT NULL,
            priority INTEGER,
            completed INTEGER NOT NULL DEFAULT 0,
            allow_late_submission INTEGER NOT NULL DEFAULT 0,
            max_points INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_subject ON assignments(subject_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_due ON assignments(due_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications(
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL DEFAULT '',
            priority TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0,
            snoozed_until TEXT,
            action_url TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_read ON notifications(read)",
        [],
    )?;

    Ok(conn)
}

use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("rollbook.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            class_id TEXT NOT NULL,
            batch_id TEXT NOT NULL,
            admission_no TEXT NOT NULL,
            name TEXT NOT NULL,
            gender TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(class_id, batch_id, admission_no)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_roster ON students(class_id, batch_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_sessions(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            batch_id TEXT NOT NULL,
            date TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE(class_id, batch_id, date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            session_id TEXT NOT NULL,
            admission_no TEXT NOT NULL,
            student_name TEXT NOT NULL,
            status TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(session_id, admission_no),
            FOREIGN KEY(session_id) REFERENCES attendance_sessions(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_entries(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            batch_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            term TEXT NOT NULL,
            exam_name TEXT NOT NULL,
            max_mark REAL NOT NULL,
            academic_year TEXT NOT NULL,
            school_name TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            seq INTEGER NOT NULL,
            UNIQUE(class_id, batch_id, subject, term, exam_name)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_marks(
            entry_id TEXT NOT NULL,
            admission_no TEXT NOT NULL,
            scored_mark REAL,
            is_absent INTEGER NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(entry_id, admission_no),
            FOREIGN KEY(entry_id) REFERENCES exam_entries(id) ON DELETE CASCADE
        )",
        [],
    )?;
    Ok(())
}

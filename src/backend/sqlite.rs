use super::{
    AttendanceRecord, Backend, BackendError, BackendResult, MarkPatch, MarkRecord, MarksEntry,
    MarksUpdate, NewAttendance, NewMarksEntry, StoredAttendance,
};
use crate::session::model::{AttendanceStatus, ExamKey, Gender, RosterEntry};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

pub struct SqliteBackend<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteBackend<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Enrols a student at the end of a class+batch roster.
    pub fn add_student(&self, class_id: &str, batch_id: &str, entry: &RosterEntry) -> BackendResult<()> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM students WHERE class_id = ? AND batch_id = ? AND admission_no = ?",
                (class_id, batch_id, &entry.admission_no),
                |r| r.get::<_, i64>(0),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(BackendError::Rejected(format!(
                "admission number {} already exists in class {} batch {}",
                entry.admission_no, class_id, batch_id
            )));
        }
        let next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students WHERE class_id = ? AND batch_id = ?",
            (class_id, batch_id),
            |r| r.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO students(class_id, batch_id, admission_no, name, gender, sort_order)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                class_id,
                batch_id,
                &entry.admission_no,
                &entry.name,
                entry.gender.as_str(),
                next,
            ),
        )?;
        Ok(())
    }

    fn attendance_session_exists(&self, session_id: &str) -> BackendResult<bool> {
        Ok(self
            .conn
            .query_row(
                "SELECT 1 FROM attendance_sessions WHERE id = ?",
                [session_id],
                |r| r.get::<_, i64>(0),
            )
            .optional()?
            .is_some())
    }
}

fn status_from_db(raw: &str) -> AttendanceStatus {
    AttendanceStatus::parse(raw).unwrap_or(AttendanceStatus::Present)
}

fn marks_entry_from_row(r: &Row<'_>) -> rusqlite::Result<MarksEntry> {
    Ok(MarksEntry {
        id: r.get(0)?,
        class_id: r.get(1)?,
        batch_id: r.get(2)?,
        subject: r.get(3)?,
        term: r.get(4)?,
        exam_name: r.get(5)?,
        max_mark: r.get(6)?,
        academic_year: r.get(7)?,
        school_name: r.get(8)?,
        created_at: r.get(9)?,
    })
}

const MARKS_ENTRY_COLUMNS: &str = "id, class_id, batch_id, subject, term, exam_name, max_mark,
     academic_year, school_name, created_at";

impl Backend for SqliteBackend<'_> {
    fn fetch_roster(&self, class_id: &str, batch_id: &str) -> BackendResult<Vec<RosterEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT admission_no, name, gender
             FROM students
             WHERE class_id = ? AND batch_id = ?
             ORDER BY sort_order",
        )?;
        let roster = stmt
            .query_map((class_id, batch_id), |r| {
                let gender: String = r.get(2)?;
                Ok(RosterEntry {
                    admission_no: r.get(0)?,
                    name: r.get(1)?,
                    gender: Gender::parse(&gender),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(roster)
    }

    fn fetch_classes(&self) -> BackendResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT class_id FROM students ORDER BY class_id")?;
        let classes = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(classes)
    }

    fn fetch_batches(&self, class_id: &str) -> BackendResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT batch_id FROM students WHERE class_id = ? ORDER BY batch_id",
        )?;
        let batches = stmt
            .query_map([class_id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(batches)
    }

    fn resolve_attendance(
        &self,
        class_id: &str,
        batch_id: &str,
        date: NaiveDate,
    ) -> BackendResult<Option<StoredAttendance>> {
        let session_id: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM attendance_sessions WHERE class_id = ? AND batch_id = ? AND date = ?",
                (class_id, batch_id, date.to_string()),
                |r| r.get(0),
            )
            .optional()?;
        let Some(session_id) = session_id else {
            return Ok(None);
        };
        let mut stmt = self.conn.prepare(
            "SELECT a.admission_no, a.student_name, a.status, COALESCE(s.gender, '')
             FROM attendance_records a
             LEFT JOIN students s
               ON s.class_id = ?
              AND s.batch_id = ?
              AND s.admission_no = a.admission_no
             WHERE a.session_id = ?
             ORDER BY a.sort_order",
        )?;
        let records = stmt
            .query_map((class_id, batch_id, &session_id), |r| {
                let status: String = r.get(2)?;
                let gender: String = r.get(3)?;
                Ok(AttendanceRecord {
                    admission_no: r.get(0)?,
                    gender: Gender::parse(&gender),
                    student_name: r.get(1)?,
                    status: status_from_db(&status),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(StoredAttendance {
            session_id,
            records,
        }))
    }

    fn create_attendance(&self, new: &NewAttendance) -> BackendResult<String> {
        if self
            .resolve_attendance(&new.class_id, &new.batch_id, new.date)?
            .is_some()
        {
            return Err(BackendError::Rejected(
                "Attendance already marked for this date".to_string(),
            ));
        }
        let session_id = Uuid::new_v4().to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO attendance_sessions(id, class_id, batch_id, date, created_by, created_at)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &session_id,
                &new.class_id,
                &new.batch_id,
                new.date.to_string(),
                &new.created_by,
                Utc::now().to_rfc3339(),
            ),
        )?;
        for (i, rec) in new.records.iter().enumerate() {
            tx.execute(
                "INSERT INTO attendance_records(session_id, admission_no, student_name, status, sort_order)
                 VALUES(?, ?, ?, ?, ?)",
                (
                    &session_id,
                    &rec.admission_no,
                    &rec.student_name,
                    rec.status.as_str(),
                    i as i64,
                ),
            )?;
        }
        tx.commit()?;
        Ok(session_id)
    }

    fn update_attendance(
        &self,
        session_id: &str,
        records: &[AttendanceRecord],
    ) -> BackendResult<()> {
        if !self.attendance_session_exists(session_id)? {
            return Err(BackendError::Rejected(
                "Attendance session not found".to_string(),
            ));
        }
        let tx = self.conn.unchecked_transaction()?;
        for rec in records {
            tx.execute(
                "INSERT INTO attendance_records(session_id, admission_no, student_name, status, sort_order)
                 VALUES(?, ?, ?, ?,
                   (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM attendance_records WHERE session_id = ?))
                 ON CONFLICT(session_id, admission_no) DO UPDATE SET
                   student_name = excluded.student_name,
                   status = excluded.status",
                (
                    session_id,
                    &rec.admission_no,
                    &rec.student_name,
                    rec.status.as_str(),
                    session_id,
                ),
            )?;
        }
        tx.execute(
            "UPDATE attendance_sessions SET updated_at = ? WHERE id = ?",
            (Utc::now().to_rfc3339(), session_id),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_attendance(&self, session_id: &str) -> BackendResult<()> {
        if !self.attendance_session_exists(session_id)? {
            return Err(BackendError::Rejected(
                "Attendance session not found".to_string(),
            ));
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM attendance_records WHERE session_id = ?",
            [session_id],
        )?;
        tx.execute("DELETE FROM attendance_sessions WHERE id = ?", [session_id])?;
        tx.commit()?;
        Ok(())
    }

    fn marks_entry(&self, entry_id: &str) -> BackendResult<Option<MarksEntry>> {
        let sql = format!("SELECT {MARKS_ENTRY_COLUMNS} FROM exam_entries WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, [entry_id], marks_entry_from_row)
            .optional()?)
    }

    fn find_marks_entry(
        &self,
        class_id: &str,
        batch_id: &str,
        exam: &ExamKey,
    ) -> BackendResult<Option<MarksEntry>> {
        let sql = format!(
            "SELECT {MARKS_ENTRY_COLUMNS} FROM exam_entries
             WHERE class_id = ? AND batch_id = ? AND subject = ? AND term = ? AND exam_name = ?"
        );
        Ok(self
            .conn
            .query_row(
                &sql,
                (class_id, batch_id, &exam.subject, &exam.term, &exam.exam_name),
                marks_entry_from_row,
            )
            .optional()?)
    }

    fn fetch_marks(&self, entry_id: &str, term: &str) -> BackendResult<Vec<MarkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.admission_no, s.name, m.scored_mark, m.is_absent, COALESCE(s.gender, '')
             FROM exam_marks m
             JOIN exam_entries e ON e.id = m.entry_id
             LEFT JOIN students s
               ON s.class_id = e.class_id
              AND s.batch_id = e.batch_id
              AND s.admission_no = m.admission_no
             WHERE m.entry_id = ? AND e.term = ?
             ORDER BY m.sort_order",
        )?;
        let marks = stmt
            .query_map((entry_id, term), |r| {
                let gender: String = r.get(4)?;
                Ok(MarkRecord {
                    admission_no: r.get(0)?,
                    gender: Gender::parse(&gender),
                    name: r.get(1)?,
                    scored_mark: r.get(2)?,
                    is_absent: r.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(marks)
    }

    fn create_marks_entry(&self, new: &NewMarksEntry) -> BackendResult<String> {
        let exam = ExamKey {
            subject: new.subject.clone(),
            term: new.term.clone(),
            exam_name: new.exam_name.clone(),
        };
        if self
            .find_marks_entry(&new.class_id, &new.batch_id, &exam)?
            .is_some()
        {
            return Err(BackendError::Rejected(format!(
                "Marks already entered for {} {} ({})",
                new.subject, new.exam_name, new.term
            )));
        }
        let entry_id = Uuid::new_v4().to_string();
        let tx = self.conn.unchecked_transaction()?;
        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM exam_entries",
            [],
            |r| r.get(0),
        )?;
        tx.execute(
            "INSERT INTO exam_entries(id, class_id, batch_id, subject, term, exam_name, max_mark,
                                      academic_year, school_name, created_by, created_at, seq)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                &entry_id,
                &new.class_id,
                &new.batch_id,
                &new.subject,
                &new.term,
                &new.exam_name,
                new.max_mark,
                &new.academic_year,
                &new.school_name,
                &new.created_by,
                Utc::now().to_rfc3339(),
                seq,
            ],
        )?;
        for (i, m) in new.marks.iter().enumerate() {
            tx.execute(
                "INSERT INTO exam_marks(entry_id, admission_no, scored_mark, is_absent, sort_order)
                 VALUES(?, ?, ?, ?, ?)",
                (
                    &entry_id,
                    &m.admission_no,
                    m.scored_mark,
                    m.is_absent as i64,
                    i as i64,
                ),
            )?;
        }
        tx.commit()?;
        Ok(entry_id)
    }

    fn update_marks_entry(&self, update: &MarksUpdate) -> BackendResult<()> {
        if self.marks_entry(&update.entry_id)?.is_none() {
            return Err(BackendError::Rejected("Exam entry not found".to_string()));
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE exam_entries SET max_mark = ? WHERE id = ?",
            (update.max_mark, &update.entry_id),
        )?;
        for m in &update.marks {
            let absent = m.is_absent as i64;
            match m.scored_mark {
                MarkPatch::Unchanged => {
                    tx.execute(
                        "INSERT INTO exam_marks(entry_id, admission_no, scored_mark, is_absent, sort_order)
                         VALUES(?, ?, NULL, ?,
                           (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM exam_marks WHERE entry_id = ?))
                         ON CONFLICT(entry_id, admission_no) DO UPDATE SET
                           is_absent = excluded.is_absent",
                        (&update.entry_id, &m.admission_no, absent, &update.entry_id),
                    )?;
                }
                MarkPatch::Cleared | MarkPatch::Value(_) => {
                    let value = match m.scored_mark {
                        MarkPatch::Value(v) => Some(v),
                        _ => None,
                    };
                    tx.execute(
                        "INSERT INTO exam_marks(entry_id, admission_no, scored_mark, is_absent, sort_order)
                         VALUES(?, ?, ?, ?,
                           (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM exam_marks WHERE entry_id = ?))
                         ON CONFLICT(entry_id, admission_no) DO UPDATE SET
                           scored_mark = excluded.scored_mark,
                           is_absent = excluded.is_absent",
                        (&update.entry_id, &m.admission_no, value, absent, &update.entry_id),
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list_marks_entries(&self) -> BackendResult<Vec<MarksEntry>> {
        let sql = format!("SELECT {MARKS_ENTRY_COLUMNS} FROM exam_entries ORDER BY seq");
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map([], marks_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

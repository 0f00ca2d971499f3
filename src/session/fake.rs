//! In-memory collaborator for reconciler tests. Counts every call so tests
//! can assert that no request was made.

use super::model::{ExamKey, Gender, MarksMeta, RosterEntry};
use super::SessionState;
use crate::backend::{
    AttendanceRecord, Backend, BackendError, BackendResult, MarkPatch, MarkRecord, MarksEntry,
    MarksUpdate, NewAttendance, NewMarksEntry, StoredAttendance,
};
use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

struct StoredSession {
    class_id: String,
    batch_id: String,
    date: NaiveDate,
    stored: StoredAttendance,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    rosters: HashMap<(String, String), Vec<RosterEntry>>,
    attendance: RefCell<Vec<StoredSession>>,
    marks: RefCell<Vec<(MarksEntry, Vec<MarkRecord>)>>,
    calls: RefCell<HashMap<&'static str, usize>>,
    fail: RefCell<Option<BackendError>>,
    next_id: Cell<u64>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state() -> SessionState {
        SessionState::new(MarksMeta {
            max_mark: None,
            academic_year: "2024-25".to_string(),
            school_name: "My School".to_string(),
        })
    }

    pub(crate) fn with_roster(mut self, class_id: &str, batch_id: &str, students: &[(&str, &str)]) -> Self {
        let roster = students
            .iter()
            .map(|(adm, name)| RosterEntry {
                admission_no: adm.to_string(),
                name: name.to_string(),
                gender: Gender::Unspecified,
            })
            .collect();
        self.rosters
            .insert((class_id.to_string(), batch_id.to_string()), roster);
        self
    }

    pub(crate) fn with_attendance(
        self,
        class_id: &str,
        batch_id: &str,
        date: NaiveDate,
        session_id: &str,
        records: Vec<AttendanceRecord>,
    ) -> Self {
        self.attendance.borrow_mut().push(StoredSession {
            class_id: class_id.to_string(),
            batch_id: batch_id.to_string(),
            date,
            stored: StoredAttendance {
                session_id: session_id.to_string(),
                records,
            },
        });
        self
    }

    pub(crate) fn with_marks_entry(
        self,
        class_id: &str,
        batch_id: &str,
        exam: &ExamKey,
        entry_id: &str,
        max_mark: f64,
        marks: Vec<MarkRecord>,
    ) -> Self {
        let entry = MarksEntry {
            id: entry_id.to_string(),
            class_id: class_id.to_string(),
            batch_id: batch_id.to_string(),
            subject: exam.subject.clone(),
            term: exam.term.clone(),
            exam_name: exam.exam_name.clone(),
            max_mark,
            academic_year: "2024-25".to_string(),
            school_name: "My School".to_string(),
            created_at: String::new(),
        };
        self.marks.borrow_mut().push((entry, marks));
        self
    }

    /// The next call of any kind fails with `err`.
    pub(crate) fn fail_next(&self, err: BackendError) {
        *self.fail.borrow_mut() = Some(err);
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.calls.borrow().get(op).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }

    fn hit(&self, op: &'static str) -> BackendResult<()> {
        *self.calls.borrow_mut().entry(op).or_insert(0) += 1;
        match self.fail.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn new_id(&self, prefix: &str) -> String {
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        format!("{prefix}{n}")
    }
}

impl Backend for FakeBackend {
    fn fetch_roster(&self, class_id: &str, batch_id: &str) -> BackendResult<Vec<RosterEntry>> {
        self.hit("fetch_roster")?;
        Ok(self
            .rosters
            .get(&(class_id.to_string(), batch_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_classes(&self) -> BackendResult<Vec<String>> {
        self.hit("fetch_classes")?;
        let mut classes: Vec<String> = self.rosters.keys().map(|(c, _)| c.clone()).collect();
        classes.sort();
        classes.dedup();
        Ok(classes)
    }

    fn fetch_batches(&self, class_id: &str) -> BackendResult<Vec<String>> {
        self.hit("fetch_batches")?;
        let mut batches: Vec<String> = self
            .rosters
            .keys()
            .filter(|(c, _)| c == class_id)
            .map(|(_, b)| b.clone())
            .collect();
        batches.sort();
        Ok(batches)
    }

    fn resolve_attendance(
        &self,
        class_id: &str,
        batch_id: &str,
        date: NaiveDate,
    ) -> BackendResult<Option<StoredAttendance>> {
        self.hit("resolve_attendance")?;
        Ok(self
            .attendance
            .borrow()
            .iter()
            .find(|s| s.class_id == class_id && s.batch_id == batch_id && s.date == date)
            .map(|s| s.stored.clone()))
    }

    fn create_attendance(&self, new: &NewAttendance) -> BackendResult<String> {
        self.hit("create_attendance")?;
        let session_id = self.new_id("S");
        self.attendance.borrow_mut().push(StoredSession {
            class_id: new.class_id.clone(),
            batch_id: new.batch_id.clone(),
            date: new.date,
            stored: StoredAttendance {
                session_id: session_id.clone(),
                records: new.records.clone(),
            },
        });
        Ok(session_id)
    }

    fn update_attendance(
        &self,
        session_id: &str,
        records: &[AttendanceRecord],
    ) -> BackendResult<()> {
        self.hit("update_attendance")?;
        let mut sessions = self.attendance.borrow_mut();
        let Some(session) = sessions
            .iter_mut()
            .find(|s| s.stored.session_id == session_id)
        else {
            return Err(BackendError::Rejected("Attendance session not found".to_string()));
        };
        for rec in records {
            if let Some(existing) = session
                .stored
                .records
                .iter_mut()
                .find(|r| r.admission_no == rec.admission_no)
            {
                existing.status = rec.status;
            }
        }
        Ok(())
    }

    fn delete_attendance(&self, session_id: &str) -> BackendResult<()> {
        self.hit("delete_attendance")?;
        self.attendance
            .borrow_mut()
            .retain(|s| s.stored.session_id != session_id);
        Ok(())
    }

    fn marks_entry(&self, entry_id: &str) -> BackendResult<Option<MarksEntry>> {
        self.hit("marks_entry")?;
        Ok(self
            .marks
            .borrow()
            .iter()
            .find(|(e, _)| e.id == entry_id)
            .map(|(e, _)| e.clone()))
    }

    fn find_marks_entry(
        &self,
        class_id: &str,
        batch_id: &str,
        exam: &ExamKey,
    ) -> BackendResult<Option<MarksEntry>> {
        self.hit("find_marks_entry")?;
        Ok(self
            .marks
            .borrow()
            .iter()
            .find(|(e, _)| e.class_id == class_id && e.batch_id == batch_id && e.exam_key() == *exam)
            .map(|(e, _)| e.clone()))
    }

    fn fetch_marks(&self, entry_id: &str, term: &str) -> BackendResult<Vec<MarkRecord>> {
        self.hit("fetch_marks")?;
        Ok(self
            .marks
            .borrow()
            .iter()
            .find(|(e, _)| e.id == entry_id && e.term == term)
            .map(|(_, m)| m.clone())
            .unwrap_or_default())
    }

    fn create_marks_entry(&self, new: &NewMarksEntry) -> BackendResult<String> {
        self.hit("create_marks_entry")?;
        let id = self.new_id("E");
        let entry = MarksEntry {
            id: id.clone(),
            class_id: new.class_id.clone(),
            batch_id: new.batch_id.clone(),
            subject: new.subject.clone(),
            term: new.term.clone(),
            exam_name: new.exam_name.clone(),
            max_mark: new.max_mark,
            academic_year: new.academic_year.clone(),
            school_name: new.school_name.clone(),
            created_at: String::new(),
        };
        self.marks.borrow_mut().push((entry, new.marks.clone()));
        Ok(id)
    }

    fn update_marks_entry(&self, update: &MarksUpdate) -> BackendResult<()> {
        self.hit("update_marks_entry")?;
        let mut entries = self.marks.borrow_mut();
        let Some((entry, marks)) = entries.iter_mut().find(|(e, _)| e.id == update.entry_id) else {
            return Err(BackendError::Rejected("Exam entry not found".to_string()));
        };
        entry.max_mark = update.max_mark;
        for m in &update.marks {
            if let Some(stored) = marks.iter_mut().find(|s| s.admission_no == m.admission_no) {
                stored.is_absent = m.is_absent;
                match m.scored_mark {
                    MarkPatch::Unchanged => {}
                    MarkPatch::Cleared => stored.scored_mark = None,
                    MarkPatch::Value(v) => stored.scored_mark = Some(v),
                }
            }
        }
        Ok(())
    }

    fn list_marks_entries(&self) -> BackendResult<Vec<MarksEntry>> {
        self.hit("list_marks_entries")?;
        Ok(self.marks.borrow().iter().map(|(e, _)| e.clone()).collect())
    }
}

use super::model::{EditMode, FieldInput, FieldValue, Row, SessionRecord};
use super::{SessionError, SessionState};

impl SessionState {
    fn editable_rows(&mut self) -> Result<&mut Vec<Row>, SessionError> {
        if self.mode == EditMode::View {
            return Err(SessionError::ReadOnly);
        }
        match self.record.as_mut() {
            Some(record) => Ok(record.rows_mut()),
            None => Err(SessionError::NoSession),
        }
    }

    /// Sets the value for one row and clears its validation error.
    ///
    /// Returns `Ok(false)` when the admission number is not on the roster or
    /// the row is marked absent (its value editor is suppressed).
    pub fn set_field(&mut self, admission_no: &str, input: FieldInput) -> Result<bool, SessionError> {
        let rows = self.editable_rows()?;
        let Some(row) = rows.iter_mut().find(|r| r.admission_no == admission_no) else {
            return Ok(false);
        };
        match (&mut row.value, input) {
            (FieldValue::Status(status), FieldInput::Status(next)) => {
                *status = next;
            }
            (FieldValue::Mark { absent: true, .. }, FieldInput::Mark(_)) => return Ok(false),
            (FieldValue::Mark { raw, .. }, FieldInput::Mark(next)) => {
                *raw = next.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            }
            (FieldValue::Status(_), FieldInput::Mark(_)) => {
                return Err(SessionError::BadInput(
                    "attendance rows take a status, not a mark".to_string(),
                ))
            }
            (FieldValue::Mark { .. }, FieldInput::Status(_)) => {
                return Err(SessionError::BadInput(
                    "marks rows take a mark, not a status".to_string(),
                ))
            }
        }
        row.error = None;
        Ok(true)
    }

    /// Flips the absence flag of one row. For attendance this is the
    /// Present/Absent toggle.
    pub fn toggle_absent(&mut self, admission_no: &str) -> Result<bool, SessionError> {
        let rows = self.editable_rows()?;
        let Some(row) = rows.iter_mut().find(|r| r.admission_no == admission_no) else {
            return Ok(false);
        };
        match &mut row.value {
            FieldValue::Status(status) => *status = status.toggled(),
            FieldValue::Mark { absent, .. } => *absent = !*absent,
        }
        if row.is_absent() {
            row.error = None;
        }
        Ok(true)
    }

    /// Edits exam metadata of a marks session. `None` leaves a field as is.
    ///
    /// Once the entry is stored only `max_mark` travels with an update, so
    /// academic year and school name are fixed; changing them is refused.
    /// Nothing is applied unless every field is acceptable.
    pub fn set_marks_meta(
        &mut self,
        max_mark: Option<f64>,
        academic_year: Option<String>,
        school_name: Option<String>,
    ) -> Result<(), SessionError> {
        if self.mode == EditMode::View {
            return Err(SessionError::ReadOnly);
        }
        let stored = matches!(self.record, Some(SessionRecord::Existing { .. }));
        let Some(meta) = self.meta.as_mut() else {
            return Err(SessionError::NoSession);
        };
        if let Some(max) = max_mark {
            if !max.is_finite() || max <= 0.0 {
                return Err(SessionError::BadInput(
                    "maxMark must be a positive number".to_string(),
                ));
            }
        }
        let academic_year = academic_year.map(|y| y.trim().to_string());
        let school_name = school_name.map(|s| s.trim().to_string());
        if stored {
            if academic_year.as_ref().is_some_and(|y| *y != meta.academic_year) {
                return Err(SessionError::BadInput(
                    "academicYear cannot change once marks are saved".to_string(),
                ));
            }
            if school_name.as_ref().is_some_and(|s| *s != meta.school_name) {
                return Err(SessionError::BadInput(
                    "schoolName cannot change once marks are saved".to_string(),
                ));
            }
        }
        if let Some(max) = max_mark {
            meta.max_mark = Some(max);
        }
        if let Some(year) = academic_year {
            meta.academic_year = year;
        }
        if let Some(school) = school_name {
            meta.school_name = school;
        }
        Ok(())
    }
}

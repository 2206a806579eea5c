//! Edits to the non-academic parts of a student profile and the per-student
//! report. Every function works on a profile the caller already cloned out of
//! the roster; the roster is written back through `roster::replace_profile`.

use crate::calc::{resolve_cgpa, resolve_sgpa, semester_total, Aggregate};
use crate::catalog::year_for_semester;
use crate::error::{RecordsError, RecordsResult};
use crate::model::{
    is_valid_semester, Accounts, FullStudentProfile, LibraryRecord, SemesterMarks, SubjectGrade,
    SubjectMarks,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    Sports,
    Extracurricular,
}

fn activities_mut(profile: &mut FullStudentProfile, kind: ActivityKind) -> &mut Vec<String> {
    match kind {
        ActivityKind::Sports => &mut profile.sports,
        ActivityKind::Extracurricular => &mut profile.extracurricular,
    }
}

/// Adds a trimmed entry; an entry already present is left alone.
pub fn add_activity(
    profile: &mut FullStudentProfile,
    kind: ActivityKind,
    value: &str,
) -> RecordsResult<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RecordsError::InvalidInput(
            "activity cannot be empty".to_string(),
        ));
    }
    let list = activities_mut(profile, kind);
    if list.iter().any(|v| v == value) {
        return Ok(false);
    }
    list.push(value.to_string());
    Ok(true)
}

pub fn remove_activity(profile: &mut FullStudentProfile, kind: ActivityKind, value: &str) -> bool {
    let list = activities_mut(profile, kind);
    let before = list.len();
    list.retain(|v| v != value);
    list.len() != before
}

pub fn set_accounts(profile: &mut FullStudentProfile, accounts: Accounts) {
    profile.accounts = accounts;
}

pub fn set_session(profile: &mut FullStudentProfile, semester: u8, session: &str) {
    let session = session.trim();
    if session.is_empty() {
        profile.session_data.remove(&semester);
    } else {
        profile.session_data.insert(semester, session.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateField {
    Sgpa,
    Cgpa,
}

/// Sets or clears one manual value for a semester, keeping the other one.
pub fn set_manual_aggregate(
    profile: &mut FullStudentProfile,
    semester: u8,
    field: AggregateField,
    value: Option<f64>,
) -> RecordsResult<()> {
    let mut manual = profile.manual(semester).copied().unwrap_or_default();
    match field {
        AggregateField::Sgpa => manual.sgpa = value,
        AggregateField::Cgpa => manual.cgpa = value,
    }
    profile.put_manual(semester, manual)
}

pub fn set_subject_grade(
    profile: &mut FullStudentProfile,
    semester: u8,
    subject_name: &str,
    grade: Option<SubjectGrade>,
) -> RecordsResult<()> {
    let entry = profile
        .academic_history
        .get_mut(&semester)
        .and_then(|m| m.as_mut())
        .and_then(|m| m.iter_mut().find(|e| e.subject_name == subject_name))
        .ok_or_else(|| {
            RecordsError::NotFound(format!(
                "no marks for {subject_name} in semester {semester}"
            ))
        })?;
    entry.grade = grade;
    Ok(())
}

pub fn add_library_record(
    profile: &mut FullStudentProfile,
    book_name: &str,
    book_code: &str,
    issue_date: &str,
) -> RecordsResult<LibraryRecord> {
    let book_name = book_name.trim();
    let book_code = book_code.trim();
    if book_name.is_empty() || book_code.is_empty() {
        return Err(RecordsError::InvalidInput(
            "book name and book code cannot be empty".to_string(),
        ));
    }
    let issue_date = issue_date.trim();
    require_date("issue date", issue_date)?;
    let record = LibraryRecord {
        id: Uuid::new_v4().to_string(),
        book_name: book_name.to_string(),
        book_code: book_code.to_string(),
        issue_date: issue_date.to_string(),
        return_date: None,
        is_returned: false,
    };
    profile.library.push(record.clone());
    Ok(record)
}

/// Flips the returned flag. `return_date` is `today` when returned, cleared otherwise.
pub fn toggle_return(
    profile: &mut FullStudentProfile,
    record_id: &str,
    today: &str,
) -> RecordsResult<LibraryRecord> {
    let record = profile
        .library
        .iter_mut()
        .find(|r| r.id == record_id)
        .ok_or_else(|| RecordsError::NotFound(format!("library record not found: {record_id}")))?;
    record.is_returned = !record.is_returned;
    record.return_date = record.is_returned.then(|| today.to_string());
    Ok(record.clone())
}

pub fn delete_library_record(profile: &mut FullStudentProfile, record_id: &str) -> RecordsResult<()> {
    let before = profile.library.len();
    profile.library.retain(|r| r.id != record_id);
    if profile.library.len() == before {
        return Err(RecordsError::NotFound(format!(
            "library record not found: {record_id}"
        )));
    }
    Ok(())
}

fn require_date(label: &str, value: &str) -> RecordsResult<()> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| {
            RecordsError::InvalidInput(format!("{label} must be YYYY-MM-DD, got {value:?}"))
        })
}

/// Trimmed, non-empty entries in first-seen order.
fn activity_list(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !out.iter().any(|v| v == value) {
            out.push(value.to_string());
        }
    }
    out
}

/// `return_date` is set exactly when the book is returned.
fn checked_library_record(mut record: LibraryRecord) -> RecordsResult<LibraryRecord> {
    record.id = record.id.trim().to_string();
    record.book_name = record.book_name.trim().to_string();
    record.book_code = record.book_code.trim().to_string();
    record.issue_date = record.issue_date.trim().to_string();
    if record.id.is_empty() || record.book_name.is_empty() || record.book_code.is_empty() {
        return Err(RecordsError::InvalidInput(
            "library records need an id, a book name and a book code".to_string(),
        ));
    }
    require_date("issue date", &record.issue_date)?;
    match (record.return_date.as_deref().map(str::trim), record.is_returned) {
        (Some(date), true) => {
            require_date("return date", date)?;
            record.return_date = Some(date.to_string());
        }
        (None, false) => {}
        _ => {
            return Err(RecordsError::InvalidInput(format!(
                "library record {}: returnDate must be set exactly when the book is returned",
                record.id
            )))
        }
    }
    Ok(record)
}

/// Swaps in a whole client-supplied profile, held to the same rules as the
/// single-field edits. The id and enrollment number cannot change.
pub fn apply_replacement(
    profile: &mut FullStudentProfile,
    replacement: FullStudentProfile,
) -> RecordsResult<()> {
    let mut next = replacement;
    if next.id != profile.id {
        return Err(RecordsError::InvalidInput(
            "a student's id cannot be changed".to_string(),
        ));
    }
    if next.enrollment_no.trim() != profile.enrollment_no {
        return Err(RecordsError::InvalidInput(
            "a student's enrollment number cannot be changed".to_string(),
        ));
    }
    next.enrollment_no = profile.enrollment_no.clone();
    next.name = next.name.trim().to_string();

    next.marks = next.marks.iter().map(SubjectMarks::clamped).collect();
    for marks in next.academic_history.values_mut().flatten() {
        *marks = marks.iter().map(SubjectMarks::clamped).collect();
    }

    let bad_semester = next
        .manual_aggregates
        .keys()
        .chain(next.session_data.keys())
        .find(|sem| !is_valid_semester(**sem));
    if let Some(sem) = bad_semester {
        return Err(RecordsError::InvalidInput(format!(
            "semester must be 1..8, got {sem}"
        )));
    }
    for manual in next.manual_aggregates.values() {
        manual.validate()?;
    }
    next.manual_aggregates.retain(|_, m| !m.is_empty());
    next.session_data = std::mem::take(&mut next.session_data)
        .into_iter()
        .map(|(sem, label)| (sem, label.trim().to_string()))
        .filter(|(_, label)| !label.is_empty())
        .collect();

    next.sports = activity_list(std::mem::take(&mut next.sports));
    next.extracurricular = activity_list(std::mem::take(&mut next.extracurricular));

    next.library = std::mem::take(&mut next.library)
        .into_iter()
        .map(checked_library_record)
        .collect::<RecordsResult<Vec<_>>>()?;
    {
        let mut ids = HashSet::new();
        if let Some(dup) = next.library.iter().find(|r| !ids.insert(r.id.as_str())) {
            return Err(RecordsError::InvalidInput(format!(
                "duplicate library record id: {}",
                dup.id
            )));
        }
    }

    *profile = next;
    Ok(())
}

pub fn books_due(profile: &FullStudentProfile) -> usize {
    profile.library.iter().filter(|r| !r.is_returned).count()
}

pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterReport {
    pub semester: u8,
    pub year: Option<u8>,
    pub marks: SemesterMarks,
    pub total_marks: f64,
    pub sgpa: Aggregate,
    pub cgpa: Aggregate,
    pub has_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub id: String,
    pub name: String,
    pub enrollment_no: String,
    pub semesters: Vec<SemesterReport>,
    pub sports: Vec<String>,
    pub extracurricular: Vec<String>,
    pub accounts: Accounts,
    pub books_due: usize,
}

/// Academic summary for every semester present in the history.
pub fn student_report(profile: &FullStudentProfile) -> StudentReport {
    let semesters = profile
        .academic_history
        .iter()
        .filter_map(|(sem, marks)| marks.as_ref().map(|m| (*sem, m)))
        .map(|(sem, marks)| SemesterReport {
            semester: sem,
            year: year_for_semester(sem),
            marks: marks.clone(),
            total_marks: semester_total(marks),
            sgpa: resolve_sgpa(profile, sem),
            cgpa: resolve_cgpa(profile, sem),
            has_failed: marks.iter().any(|m| m.grade == Some(SubjectGrade::F)),
            session: profile.session_data.get(&sem).cloned(),
        })
        .collect();
    StudentReport {
        id: profile.id.clone(),
        name: profile.name.clone(),
        enrollment_no: profile.enrollment_no.clone(),
        semesters,
        sports: profile.sports.clone(),
        extracurricular: profile.extracurricular.clone(),
        accounts: profile.accounts,
        books_due: books_due(profile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ManualAggregate;
    use serde_json::json;

    fn manual_pair(sgpa: Option<f64>, cgpa: Option<f64>) -> ManualAggregate {
        ManualAggregate { sgpa, cgpa }
    }

    fn profile() -> FullStudentProfile {
        serde_json::from_value(json!({
            "id": "E7",
            "name": "Ravi",
            "enrollmentNo": "E7",
            "academicHistory": {
                "1": [
                    { "subjectName": "Maths", "theoryMidSem": 18, "grade": "A" },
                    { "subjectName": "Physics", "theoryMidSem": 10, "grade": "F" }
                ],
                "2": null
            }
        }))
        .expect("decode profile")
    }

    #[test]
    fn activities_are_a_set_of_trimmed_strings() {
        let mut p = profile();
        assert!(add_activity(&mut p, ActivityKind::Sports, " Chess ").expect("add"));
        assert!(!add_activity(&mut p, ActivityKind::Sports, "Chess").expect("dup"));
        assert_eq!(p.sports, vec!["Chess".to_string()]);
        assert!(add_activity(&mut p, ActivityKind::Sports, "  ").is_err());
        assert!(remove_activity(&mut p, ActivityKind::Sports, "Chess"));
        assert!(!remove_activity(&mut p, ActivityKind::Sports, "Chess"));
        assert!(p.extracurricular.is_empty());
    }

    #[test]
    fn return_date_tracks_returned_flag() {
        let mut p = profile();
        assert!(add_library_record(&mut p, "", "B1", "2024-02-01").is_err());
        assert!(add_library_record(&mut p, "Algorithms", "B1", "01/02/2024").is_err());
        let r = add_library_record(&mut p, " Algorithms ", "B1", "2024-02-01").expect("add");
        assert_eq!(r.book_name, "Algorithms");
        assert!(!r.is_returned);
        assert_eq!(books_due(&p), 1);

        let r = toggle_return(&mut p, &r.id, "2024-03-01").expect("return");
        assert!(r.is_returned);
        assert_eq!(r.return_date.as_deref(), Some("2024-03-01"));
        assert_eq!(books_due(&p), 0);

        let r = toggle_return(&mut p, &r.id, "2024-03-05").expect("undo");
        assert!(!r.is_returned);
        assert_eq!(r.return_date, None);

        delete_library_record(&mut p, &r.id).expect("delete");
        assert!(p.library.is_empty());
        assert_eq!(
            delete_library_record(&mut p, &r.id).expect_err("gone").code(),
            "not_found"
        );
    }

    #[test]
    fn manual_aggregate_fields_merge() {
        let mut p = profile();
        set_manual_aggregate(&mut p, 1, AggregateField::Sgpa, Some(7.5)).expect("sgpa");
        set_manual_aggregate(&mut p, 1, AggregateField::Cgpa, Some(7.9)).expect("cgpa");
        assert_eq!(p.manual(1), Some(&manual_pair(Some(7.5), Some(7.9))));
        set_manual_aggregate(&mut p, 1, AggregateField::Sgpa, None).expect("clear");
        assert_eq!(p.manual(1), Some(&manual_pair(None, Some(7.9))));
        assert!(set_manual_aggregate(&mut p, 1, AggregateField::Sgpa, Some(11.0)).is_err());
    }

    #[test]
    fn replacement_is_normalized_like_single_edits() {
        let mut p = profile();
        let mut next = p.clone();
        next.name = " Ravi Kumar ".into();
        next.sports = vec!["Chess".into(), " Chess".into(), "".into(), "Hockey".into()];
        next.session_data.insert(1, "  ".into());
        next.manual_aggregates.insert(1, manual_pair(Some(8.0), None));
        next.manual_aggregates.insert(2, manual_pair(None, None));
        if let Some(Some(marks)) = next.academic_history.get_mut(&1) {
            marks[0].theory_quiz = 99.0;
        }
        next.library.push(LibraryRecord {
            id: "lib-1".into(),
            book_name: "Optics".into(),
            book_code: "PH-2".into(),
            issue_date: "2024-01-10".into(),
            return_date: Some("2024-02-01".into()),
            is_returned: true,
        });

        apply_replacement(&mut p, next).expect("replace");
        assert_eq!(p.name, "Ravi Kumar");
        assert_eq!(p.sports, vec!["Chess".to_string(), "Hockey".to_string()]);
        assert!(p.session_data.is_empty());
        assert_eq!(p.manual(1), Some(&manual_pair(Some(8.0), None)));
        assert!(p.manual(2).is_none());
        assert_eq!(p.semester_marks(1)[0].theory_quiz, 10.0);
        assert_eq!(books_due(&p), 0);
    }

    #[test]
    fn replacement_rejects_identity_changes_and_broken_records() {
        let original = profile();
        let mut p = original.clone();

        let mut moved = original.clone();
        moved.enrollment_no = "E8".into();
        let e = apply_replacement(&mut p, moved).expect_err("enrollment change");
        assert_eq!(e.code(), "invalid_input");

        let mut inflated = original.clone();
        inflated.manual_aggregates.insert(1, manual_pair(Some(42.0), None));
        assert!(apply_replacement(&mut p, inflated).is_err());

        let mut far = original.clone();
        far.session_data.insert(12, "2030".into());
        assert!(apply_replacement(&mut p, far).is_err());

        let record = LibraryRecord {
            id: "lib-1".into(),
            book_name: "Optics".into(),
            book_code: "PH-2".into(),
            issue_date: "2024-01-10".into(),
            return_date: None,
            is_returned: true,
        };
        let mut unreturned_date = original.clone();
        unreturned_date.library.push(record.clone());
        assert!(apply_replacement(&mut p, unreturned_date).is_err());

        let mut twice = original.clone();
        let open = LibraryRecord {
            is_returned: false,
            ..record
        };
        twice.library = vec![open.clone(), open];
        assert!(apply_replacement(&mut p, twice).is_err());

        assert_eq!(p, original);
    }

    #[test]
    fn report_lists_present_semesters_with_resolved_aggregates() {
        let mut p = profile();
        set_session(&mut p, 1, "2023-24 Odd");
        let report = student_report(&p);
        assert_eq!(report.semesters.len(), 1);
        let s1 = &report.semesters[0];
        assert_eq!(s1.year, Some(1));
        assert_eq!(s1.total_marks, 28.0);
        assert_eq!(s1.sgpa, Aggregate::Computed(4.5));
        assert_eq!(s1.cgpa, Aggregate::Computed(4.5));
        assert!(s1.has_failed);
        assert_eq!(s1.session.as_deref(), Some("2023-24 Odd"));

        set_subject_grade(&mut p, 1, "Physics", Some(SubjectGrade::B)).expect("grade");
        let report = student_report(&p);
        assert!(!report.semesters[0].has_failed);
        assert_eq!(report.semesters[0].sgpa, Aggregate::Computed(8.0));
        assert!(set_subject_grade(&mut p, 2, "Physics", None).is_err());
    }
}

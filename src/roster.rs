use crate::calc::{grade, max_marks_for, semester_total};
use crate::catalog::Selection;
use crate::error::{RecordsError, RecordsResult};
use crate::model::{
    Accounts, FullStudentProfile, ManualAggregate, MarkComponent, NewStudent, SemesterMarks,
    Subject, SubjectMarks, FIRST_SEMESTER, LAST_SEMESTER,
};
use std::collections::{BTreeMap, HashMap};

pub fn zeroed_marks(subjects: &[Subject]) -> SemesterMarks {
    subjects
        .iter()
        .map(|s| SubjectMarks::zeroed(&s.name))
        .collect()
}

/// Rebuilds `semester` for every student from `new_subjects`: matching entries
/// are kept as-is, new subjects get zero marks, removed subjects are dropped.
/// Other semesters are untouched.
pub fn apply_new_subject_list(
    students: &[FullStudentProfile],
    semester: u8,
    new_subjects: &[Subject],
) -> Vec<FullStudentProfile> {
    students
        .iter()
        .map(|student| {
            let current = student.semester_marks(semester);
            let marks: SemesterMarks = new_subjects
                .iter()
                .map(|sub| {
                    current
                        .iter()
                        .find(|m| m.subject_name == sub.name)
                        .cloned()
                        .unwrap_or_else(|| SubjectMarks::zeroed(&sub.name))
                })
                .collect();
            let mut out = student.clone();
            out.academic_history.insert(semester, Some(marks));
            out
        })
        .collect()
}

fn new_profile(
    name: &str,
    enrollment_no: &str,
    semester: u8,
    marks: SemesterMarks,
    subject_count: usize,
) -> FullStudentProfile {
    let total_marks = semester_total(&marks);
    let mut academic_history = BTreeMap::new();
    for sem in FIRST_SEMESTER..=LAST_SEMESTER {
        let entry = if sem == semester {
            Some(marks.clone())
        } else {
            None
        };
        academic_history.insert(sem, entry);
    }
    FullStudentProfile {
        id: enrollment_no.to_string(),
        name: name.to_string(),
        enrollment_no: enrollment_no.to_string(),
        marks,
        total_marks,
        grade: grade(total_marks, max_marks_for(subject_count)),
        sgpa: None,
        cgpa: None,
        academic_history,
        manual_aggregates: BTreeMap::new(),
        session_data: BTreeMap::new(),
        sports: Vec::new(),
        extracurricular: Vec::new(),
        accounts: Accounts::default(),
        library: Vec::new(),
    }
}

/// One identity row coming from a roster import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedRow {
    pub name: String,
    pub enrollment_no: String,
    pub marks: SemesterMarks,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub students: Vec<FullStudentProfile>,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Merges imported rows into the roster keyed by enrollment number.
///
/// Existing students only get `academic_history[semester]` replaced. Unknown
/// enrollments become new profiles appended after the existing roster; a
/// later row with the same new enrollment replaces the earlier one.
pub fn import_roster(
    existing: &[FullStudentProfile],
    rows: &[ImportedRow],
    selection: Option<&Selection>,
    subject_count: usize,
) -> RecordsResult<ImportOutcome> {
    let Some(selection) = selection else {
        return Err(RecordsError::MissingSelection(
            "cannot import data without a selected batch, semester, and department".to_string(),
        ));
    };
    let semester = selection.semester;

    let mut students: Vec<FullStudentProfile> = existing.to_vec();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, s) in students.iter().enumerate() {
        index.insert(s.enrollment_no.clone(), i);
    }
    let existing_count = students.len();

    let mut updated = 0usize;
    let mut skipped = 0usize;
    for row in rows {
        let name = row.name.trim();
        let enrollment_no = row.enrollment_no.trim();
        if name.is_empty() || enrollment_no.is_empty() {
            skipped += 1;
            continue;
        }
        match index.get(enrollment_no).copied() {
            Some(i) if i < existing_count => {
                students[i]
                    .academic_history
                    .insert(semester, Some(row.marks.clone()));
                updated += 1;
            }
            Some(i) => {
                students[i] = new_profile(
                    name,
                    enrollment_no,
                    semester,
                    row.marks.clone(),
                    subject_count,
                );
            }
            None => {
                index.insert(enrollment_no.to_string(), students.len());
                students.push(new_profile(
                    name,
                    enrollment_no,
                    semester,
                    row.marks.clone(),
                    subject_count,
                ));
            }
        }
    }

    let created = students.len() - existing_count;
    Ok(ImportOutcome {
        students,
        created,
        updated,
        skipped,
    })
}

pub fn add_student(
    students: &[FullStudentProfile],
    candidate: &NewStudent,
    semester: u8,
    subject_count: usize,
) -> RecordsResult<Vec<FullStudentProfile>> {
    let enrollment_no = candidate.enrollment_no.trim();
    if enrollment_no.is_empty() {
        return Err(RecordsError::InvalidInput(
            "enrollment number cannot be empty".to_string(),
        ));
    }
    if students.iter().any(|s| s.enrollment_no == enrollment_no) {
        return Err(RecordsError::DuplicateEnrollment(enrollment_no.to_string()));
    }

    let manual = ManualAggregate {
        sgpa: candidate.sgpa,
        cgpa: candidate.cgpa,
    };

    let marks: SemesterMarks = candidate.marks.iter().map(SubjectMarks::clamped).collect();
    let mut profile = new_profile(
        candidate.name.trim(),
        enrollment_no,
        semester,
        marks,
        subject_count,
    );
    profile.put_manual(semester, manual)?;

    let mut out = students.to_vec();
    out.push(profile);
    Ok(out)
}

pub fn find_student<'a>(
    students: &'a [FullStudentProfile],
    id: &str,
) -> RecordsResult<&'a FullStudentProfile> {
    students
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| RecordsError::NotFound(format!("student not found: {id}")))
}

fn with_student<F>(
    students: &[FullStudentProfile],
    id: &str,
    edit: F,
) -> RecordsResult<Vec<FullStudentProfile>>
where
    F: FnOnce(&mut FullStudentProfile) -> RecordsResult<()>,
{
    let pos = students
        .iter()
        .position(|s| s.id == id)
        .ok_or_else(|| RecordsError::NotFound(format!("student not found: {id}")))?;
    let mut out = students.to_vec();
    edit(&mut out[pos])?;
    Ok(out)
}

/// Saves an edited row: the semester's marks plus its manual SGPA/CGPA.
pub fn update_student_semester(
    students: &[FullStudentProfile],
    id: &str,
    semester: u8,
    marks: &[SubjectMarks],
    manual: ManualAggregate,
) -> RecordsResult<Vec<FullStudentProfile>> {
    with_student(students, id, |s| {
        let marks: SemesterMarks = marks.iter().map(SubjectMarks::clamped).collect();
        s.put_manual(semester, manual)?;
        s.academic_history.insert(semester, Some(marks));
        Ok(())
    })
}

fn subject_entry<'a>(
    student: &'a mut FullStudentProfile,
    semester: u8,
    subject_name: &str,
) -> RecordsResult<&'a mut SubjectMarks> {
    student
        .academic_history
        .get_mut(&semester)
        .and_then(|m| m.as_mut())
        .and_then(|m| m.iter_mut().find(|e| e.subject_name == subject_name))
        .ok_or_else(|| {
            RecordsError::NotFound(format!(
                "no marks for {subject_name} in semester {semester}"
            ))
        })
}

pub fn set_mark(
    students: &[FullStudentProfile],
    id: &str,
    semester: u8,
    subject_name: &str,
    component: MarkComponent,
    value: f64,
) -> RecordsResult<Vec<FullStudentProfile>> {
    with_student(students, id, |s| {
        subject_entry(s, semester, subject_name)?.set(component, value);
        Ok(())
    })
}

pub fn set_re_exam(
    students: &[FullStudentProfile],
    id: &str,
    semester: u8,
    subject_name: &str,
    component: MarkComponent,
    value: Option<f64>,
) -> RecordsResult<Vec<FullStudentProfile>> {
    with_student(students, id, |s| {
        subject_entry(s, semester, subject_name)?.set_re_exam(component, value)
    })
}

pub fn delete_student(
    students: &[FullStudentProfile],
    id: &str,
) -> RecordsResult<Vec<FullStudentProfile>> {
    find_student(students, id)?;
    Ok(students.iter().filter(|s| s.id != id).cloned().collect())
}

/// Replaces a whole profile in place. The id selects the row and never changes.
pub fn replace_profile(
    students: &[FullStudentProfile],
    profile: FullStudentProfile,
) -> RecordsResult<Vec<FullStudentProfile>> {
    let id = profile.id.clone();
    with_student(students, &id, move |s| {
        *s = profile;
        Ok(())
    })
}

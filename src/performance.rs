use crate::calc::{grade, max_marks_for, resolve_cgpa, resolve_sgpa, semester_total};
use crate::model::{FullStudentProfile, OverallGrade, Subject, SubjectGrade};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Class-level view of one semester. `students` carry the viewed semester's
/// marks in `marks` with totals and grade recomputed, sorted by total.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceData {
    pub average_percentage: f64,
    pub pass_percentage: f64,
    pub max_marks: f64,
    pub students: Vec<FullStudentProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PerformanceView {
    #[default]
    All,
    Failed,
}

pub fn build_performance_data(
    students: &[FullStudentProfile],
    semester: u8,
    subjects: &[Subject],
) -> PerformanceData {
    let max_marks = max_marks_for(subjects.len());

    let mut rows: Vec<FullStudentProfile> = students
        .iter()
        .map(|student| {
            let marks = student.semester_marks(semester).to_vec();
            let total_marks = semester_total(&marks);
            let manual = student.manual(semester).copied().unwrap_or_default();
            let mut out = student.clone();
            out.marks = marks;
            out.total_marks = total_marks;
            out.grade = grade(total_marks, max_marks);
            out.sgpa = manual.sgpa;
            out.cgpa = manual.cgpa;
            out
        })
        .collect();

    // sort_by is stable, so ties keep roster order.
    rows.sort_by(|a, b| {
        b.total_marks
            .partial_cmp(&a.total_marks)
            .unwrap_or(Ordering::Equal)
    });

    let valid: Vec<&FullStudentProfile> = rows.iter().filter(|s| s.total_marks > 0.0).collect();
    let (average_percentage, pass_percentage) = if valid.is_empty() || max_marks == 0.0 {
        (0.0, 0.0)
    } else {
        let count = valid.len() as f64;
        let mean_total = valid.iter().map(|s| s.total_marks).sum::<f64>() / count;
        let passed = valid
            .iter()
            .filter(|s| s.grade != OverallGrade::F)
            .count() as f64;
        (mean_total / max_marks * 100.0, passed / count * 100.0)
    };

    PerformanceData {
        average_percentage,
        pass_percentage,
        max_marks,
        students: rows,
    }
}

pub fn has_failed_subject(student: &FullStudentProfile) -> bool {
    student
        .marks
        .iter()
        .any(|m| m.grade == Some(SubjectGrade::F))
}

/// Keeps only students with a subject graded F; class statistics are unchanged.
pub fn failed_view(data: PerformanceData) -> PerformanceData {
    PerformanceData {
        students: data
            .students
            .into_iter()
            .filter(has_failed_subject)
            .collect(),
        ..data
    }
}

pub fn select_view(data: PerformanceData, view: PerformanceView) -> PerformanceData {
    match view {
        PerformanceView::All => data,
        PerformanceView::Failed => failed_view(data),
    }
}

/// One line of the results export.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub serial: usize,
    pub enrollment_no: String,
    pub name: String,
    pub passed: bool,
    pub sgpa: f64,
    pub cgpa: f64,
}

/// Result rows in the order of `data.students`, which must come from
/// `build_performance_data` for `semester`.
pub fn result_rows(data: &PerformanceData, semester: u8) -> Vec<ResultRow> {
    data.students
        .iter()
        .enumerate()
        .map(|(i, s)| ResultRow {
            serial: i + 1,
            enrollment_no: s.enrollment_no.clone(),
            name: s.name.clone(),
            passed: !has_failed_subject(s),
            sgpa: resolve_sgpa(s, semester).value(),
            cgpa: resolve_cgpa(s, semester).value(),
        })
        .collect()
}

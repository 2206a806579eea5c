use crate::model::{
    FullStudentProfile, ManualAggregate, OverallGrade, SemesterMarks, SubjectMarks,
    FIRST_SEMESTER, LAST_SEMESTER,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Mid-sem(20) + quiz(10) + theory end-sem(70) + practical end-sem(30) + lab(20).
/// Real curricula weight subjects differently; every subject is treated as 150.
pub const SUBJECT_MAX_MARKS: f64 = 150.0;

/// `toFixed(2)`-style rounding used for SGPA/CGPA.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn max_marks_for(subject_count: usize) -> f64 {
    subject_count as f64 * SUBJECT_MAX_MARKS
}

/// Sum of the five components. Re-exam scores replace the matching end-sem
/// scores; mid-sem, quiz and lab work are never overridden.
pub fn subject_total(marks: &SubjectMarks) -> f64 {
    let re = marks.re_exam.unwrap_or_default();
    let theory_end_sem = re.theory_end_sem.unwrap_or(marks.theory_end_sem);
    let practical_end_sem = re.practical_end_sem.unwrap_or(marks.practical_end_sem);
    marks.theory_mid_sem + marks.theory_quiz + theory_end_sem + practical_end_sem
        + marks.practical_lab_work
}

pub fn semester_total(marks: &[SubjectMarks]) -> f64 {
    marks.iter().map(subject_total).sum()
}

pub fn grade(total_marks: f64, max_marks: f64) -> OverallGrade {
    if max_marks == 0.0 {
        return OverallGrade::F;
    }
    let pct = total_marks / max_marks * 100.0;
    // Outside [0, 120] only happens with corrupt input.
    if !(0.0..=120.0).contains(&pct) {
        return OverallGrade::F;
    }
    if pct >= 90.0 {
        OverallGrade::A
    } else if pct >= 80.0 {
        OverallGrade::B
    } else if pct >= 70.0 {
        OverallGrade::C
    } else if pct >= 60.0 {
        OverallGrade::D
    } else {
        OverallGrade::F
    }
}

/// Mean grade points over subjects with a grade assigned.
pub fn sgpa(marks: &[SubjectMarks]) -> f64 {
    let mut points = 0.0_f64;
    let mut graded = 0usize;
    for g in marks.iter().filter_map(|m| m.grade) {
        points += g.points();
        graded += 1;
    }
    if graded == 0 {
        return 0.0;
    }
    round_2_decimals(points / graded as f64)
}

/// Mean of per-semester SGPA over semesters 1..8. A manual SGPA wins over the
/// computed one; semesters with neither are left out of the denominator.
pub fn cgpa(
    history: &BTreeMap<u8, Option<SemesterMarks>>,
    manual: &BTreeMap<u8, ManualAggregate>,
) -> f64 {
    let mut total = 0.0_f64;
    let mut count = 0usize;
    for sem in FIRST_SEMESTER..=LAST_SEMESTER {
        let manual_sgpa = manual.get(&sem).and_then(|m| m.sgpa);
        let contribution = match manual_sgpa {
            Some(v) => Some(v),
            None => history
                .get(&sem)
                .and_then(|m| m.as_deref())
                .map(sgpa),
        };
        if let Some(v) = contribution {
            total += v;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    round_2_decimals(total / count as f64)
}

/// An SGPA/CGPA value together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", content = "value", rename_all = "camelCase")]
pub enum Aggregate {
    Manual(f64),
    Computed(f64),
}

impl Aggregate {
    fn prefer(manual: Option<f64>, computed: impl FnOnce() -> f64) -> Self {
        match manual {
            Some(v) => Self::Manual(v),
            None => Self::Computed(computed()),
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Self::Manual(v) | Self::Computed(v) => v,
        }
    }
}

pub fn resolve_sgpa(profile: &FullStudentProfile, semester: u8) -> Aggregate {
    Aggregate::prefer(profile.manual(semester).and_then(|m| m.sgpa), || {
        sgpa(profile.semester_marks(semester))
    })
}

pub fn resolve_cgpa(profile: &FullStudentProfile, semester: u8) -> Aggregate {
    Aggregate::prefer(profile.manual(semester).and_then(|m| m.cgpa), || {
        cgpa(&profile.academic_history, &profile.manual_aggregates)
    })
}

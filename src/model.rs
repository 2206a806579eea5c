use crate::error::{RecordsError, RecordsResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

pub const FIRST_SEMESTER: u8 = 1;
pub const LAST_SEMESTER: u8 = 8;

pub fn is_valid_semester(semester: u8) -> bool {
    (FIRST_SEMESTER..=LAST_SEMESTER).contains(&semester)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub category: String,
}

/// Letter grade a staff member assigns to one subject. Drives SGPA points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectGrade {
    APlus,
    A,
    BPlus,
    B,
    CPlus,
    C,
    D,
    F,
}

impl SubjectGrade {
    pub const ALL: [SubjectGrade; 8] = [
        SubjectGrade::APlus,
        SubjectGrade::A,
        SubjectGrade::BPlus,
        SubjectGrade::B,
        SubjectGrade::CPlus,
        SubjectGrade::C,
        SubjectGrade::D,
        SubjectGrade::F,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        Self::ALL.into_iter().find(|g| g.as_str() == t)
    }

    pub fn points(self) -> f64 {
        match self {
            Self::APlus => 10.0,
            Self::A => 9.0,
            Self::BPlus => 8.0,
            Self::B => 7.0,
            Self::CPlus => 6.0,
            Self::C => 5.0,
            Self::D => 4.0,
            Self::F => 0.0,
        }
    }
}

impl Serialize for SubjectGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Overall semester grade derived from the percentage of total marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverallGrade {
    A,
    B,
    C,
    D,
    #[default]
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkComponent {
    TheoryMidSem,
    TheoryQuiz,
    TheoryEndSem,
    PracticalEndSem,
    PracticalLabWork,
}

impl MarkComponent {
    pub fn max(self) -> f64 {
        match self {
            Self::TheoryMidSem => 20.0,
            Self::TheoryQuiz => 10.0,
            Self::TheoryEndSem => 70.0,
            Self::PracticalEndSem => 30.0,
            Self::PracticalLabWork => 20.0,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "theoryMidSem" => Some(Self::TheoryMidSem),
            "theoryQuiz" => Some(Self::TheoryQuiz),
            "theoryEndSem" => Some(Self::TheoryEndSem),
            "practicalEndSem" => Some(Self::PracticalEndSem),
            "practicalLabWork" => Some(Self::PracticalLabWork),
            _ => None,
        }
    }

    /// Only the two end-semester exams can be re-sat.
    pub fn allows_re_exam(self) -> bool {
        matches!(self, Self::TheoryEndSem | Self::PracticalEndSem)
    }
}

/// Entry-form clamp: integer part of the value, bounded to `[0, max]`.
pub fn clamp_mark(component: MarkComponent, value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.trunc().clamp(0.0, component.max())
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReExam {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theory_end_sem: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practical_end_sem: Option<f64>,
}

impl ReExam {
    pub fn is_empty(&self) -> bool {
        self.theory_end_sem.is_none() && self.practical_end_sem.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMarks {
    pub subject_name: String,
    #[serde(default, deserialize_with = "lenient_mark")]
    pub theory_mid_sem: f64,
    #[serde(default, deserialize_with = "lenient_mark")]
    pub theory_quiz: f64,
    #[serde(default, deserialize_with = "lenient_mark")]
    pub theory_end_sem: f64,
    #[serde(default, deserialize_with = "lenient_mark")]
    pub practical_end_sem: f64,
    #[serde(default, deserialize_with = "lenient_mark")]
    pub practical_lab_work: f64,
    #[serde(
        default,
        deserialize_with = "lenient_grade",
        skip_serializing_if = "Option::is_none"
    )]
    pub grade: Option<SubjectGrade>,
    #[serde(
        default,
        deserialize_with = "lenient_re_exam",
        skip_serializing_if = "Option::is_none"
    )]
    pub re_exam: Option<ReExam>,
}

impl SubjectMarks {
    pub fn zeroed(subject_name: &str) -> Self {
        Self {
            subject_name: subject_name.to_string(),
            theory_mid_sem: 0.0,
            theory_quiz: 0.0,
            theory_end_sem: 0.0,
            practical_end_sem: 0.0,
            practical_lab_work: 0.0,
            grade: None,
            re_exam: None,
        }
    }

    pub fn get(&self, component: MarkComponent) -> f64 {
        match component {
            MarkComponent::TheoryMidSem => self.theory_mid_sem,
            MarkComponent::TheoryQuiz => self.theory_quiz,
            MarkComponent::TheoryEndSem => self.theory_end_sem,
            MarkComponent::PracticalEndSem => self.practical_end_sem,
            MarkComponent::PracticalLabWork => self.practical_lab_work,
        }
    }

    pub fn set(&mut self, component: MarkComponent, value: f64) {
        let v = clamp_mark(component, value);
        match component {
            MarkComponent::TheoryMidSem => self.theory_mid_sem = v,
            MarkComponent::TheoryQuiz => self.theory_quiz = v,
            MarkComponent::TheoryEndSem => self.theory_end_sem = v,
            MarkComponent::PracticalEndSem => self.practical_end_sem = v,
            MarkComponent::PracticalLabWork => self.practical_lab_work = v,
        }
    }

    /// Sets or clears one re-exam score. Clearing the last defined score
    /// removes the override entirely.
    pub fn set_re_exam(&mut self, component: MarkComponent, value: Option<f64>) -> RecordsResult<()> {
        if !component.allows_re_exam() {
            return Err(RecordsError::InvalidInput(format!(
                "{component:?} has no re-exam"
            )));
        }
        let mut re = self.re_exam.unwrap_or_default();
        let v = value.map(|v| clamp_mark(component, v));
        match component {
            MarkComponent::TheoryEndSem => re.theory_end_sem = v,
            _ => re.practical_end_sem = v,
        }
        self.re_exam = if re.is_empty() { None } else { Some(re) };
        Ok(())
    }

    /// Same record with every component clamped into its entry range.
    pub fn clamped(&self) -> Self {
        let mut out = self.clone();
        for c in [
            MarkComponent::TheoryMidSem,
            MarkComponent::TheoryQuiz,
            MarkComponent::TheoryEndSem,
            MarkComponent::PracticalEndSem,
            MarkComponent::PracticalLabWork,
        ] {
            out.set(c, self.get(c));
        }
        out.re_exam = self.re_exam.and_then(|re| {
            let re = ReExam {
                theory_end_sem: re
                    .theory_end_sem
                    .map(|v| clamp_mark(MarkComponent::TheoryEndSem, v)),
                practical_end_sem: re
                    .practical_end_sem
                    .map(|v| clamp_mark(MarkComponent::PracticalEndSem, v)),
            };
            (!re.is_empty()).then_some(re)
        });
        out
    }
}

pub type SemesterMarks = Vec<SubjectMarks>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accounts {
    #[serde(default)]
    pub college_fee_due: bool,
    #[serde(default)]
    pub is_hostel_resident: bool,
    #[serde(default)]
    pub hostel_fee_due: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ManualAggregate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgpa: Option<f64>,
}

impl ManualAggregate {
    pub fn is_empty(&self) -> bool {
        self.sgpa.is_none() && self.cgpa.is_none()
    }

    /// Values that are set must lie on the 0..10 grade point scale.
    pub fn validate(&self) -> RecordsResult<()> {
        for v in [self.sgpa, self.cgpa].into_iter().flatten() {
            if !(0.0..=10.0).contains(&v) {
                return Err(RecordsError::InvalidInput(format!(
                    "grade point average must be within 0..10, got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryRecord {
    pub id: String,
    pub book_name: String,
    pub book_code: String,
    pub issue_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    #[serde(default)]
    pub is_returned: bool,
}

/// A student as stored in a batch+department roster.
///
/// `marks`, `total_marks`, `grade`, `sgpa` and `cgpa` describe the currently
/// viewed semester and are recomputed for every view; `academic_history` is
/// the source of truth for marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullStudentProfile {
    pub id: String,
    pub name: String,
    pub enrollment_no: String,
    #[serde(default, deserialize_with = "lenient_marks")]
    pub marks: SemesterMarks,
    #[serde(default)]
    pub total_marks: f64,
    #[serde(default)]
    pub grade: OverallGrade,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgpa: Option<f64>,
    #[serde(default, deserialize_with = "lenient_history")]
    pub academic_history: BTreeMap<u8, Option<SemesterMarks>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub manual_aggregates: BTreeMap<u8, ManualAggregate>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub session_data: BTreeMap<u8, String>,
    #[serde(default)]
    pub sports: Vec<String>,
    #[serde(default)]
    pub extracurricular: Vec<String>,
    #[serde(default)]
    pub accounts: Accounts,
    #[serde(default)]
    pub library: Vec<LibraryRecord>,
}

impl FullStudentProfile {
    /// Marks recorded for `semester`; empty when the semester is absent.
    pub fn semester_marks(&self, semester: u8) -> &[SubjectMarks] {
        self.academic_history
            .get(&semester)
            .and_then(|m| m.as_deref())
            .unwrap_or(&[])
    }

    pub fn manual(&self, semester: u8) -> Option<&ManualAggregate> {
        self.manual_aggregates.get(&semester)
    }

    /// Stores a manual aggregate, dropping the entry when both values are unset.
    /// Out-of-range values are rejected and leave the profile unchanged.
    pub fn put_manual(&mut self, semester: u8, manual: ManualAggregate) -> RecordsResult<()> {
        manual.validate()?;
        if manual.is_empty() {
            self.manual_aggregates.remove(&semester);
        } else {
            self.manual_aggregates.insert(semester, manual);
        }
        Ok(())
    }
}

/// Candidate record for a student being added by hand or from a CSV row.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enrollment_no: String,
    #[serde(default, deserialize_with = "lenient_marks")]
    pub marks: SemesterMarks,
    #[serde(default)]
    pub sgpa: Option<f64>,
    #[serde(default)]
    pub cgpa: Option<f64>,
}

/// Decodes one semester's marks. Anything but an array counts as absent, and
/// elements without a string `subjectName` are dropped.
pub fn semester_from_value(value: serde_json::Value) -> Option<SemesterMarks> {
    match value {
        serde_json::Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| serde_json::from_value::<SubjectMarks>(v).ok())
                .collect(),
        ),
        _ => None,
    }
}

fn lenient_mark<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0))
}

fn lenient_grade<'de, D>(deserializer: D) -> Result<Option<SubjectGrade>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::String(s)) = raw else {
        return Ok(None);
    };
    if s.trim().is_empty() {
        return Ok(None);
    }
    let parsed = SubjectGrade::parse(&s);
    if parsed.is_none() {
        log::warn!("event=grade_decode module=model status=ignored value={:?}", s);
    }
    Ok(parsed)
}

fn lenient_re_exam<'de, D>(deserializer: D) -> Result<Option<ReExam>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|v| v.is_object()) else {
        return Ok(None);
    };
    let score = |key: &str| raw.get(key).and_then(|v| v.as_f64()).filter(|v| v.is_finite());
    let re = ReExam {
        theory_end_sem: score("theoryEndSem"),
        practical_end_sem: score("practicalEndSem"),
    };
    Ok((!re.is_empty()).then_some(re))
}

fn lenient_marks<'de, D>(deserializer: D) -> Result<SemesterMarks, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(semester_from_value).unwrap_or_default())
}

fn lenient_history<'de, D>(deserializer: D) -> Result<BTreeMap<u8, Option<SemesterMarks>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    let mut out = BTreeMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let Ok(semester) = key.trim().parse::<u8>() else {
            continue;
        };
        if !is_valid_semester(semester) {
            continue;
        }
        out.insert(semester, semester_from_value(value));
    }
    Ok(out)
}

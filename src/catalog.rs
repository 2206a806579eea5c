use crate::error::{RecordsError, RecordsResult};
use crate::model::is_valid_semester;
use serde::Serialize;

pub const LIBRARY_DEPARTMENT_ID: &str = "library";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: &'static str,
    pub name: &'static str,
    pub academic: bool,
}

pub const DEPARTMENTS: [Department; 5] = [
    Department {
        id: "cse",
        name: "Computer Science and Engineering",
        academic: true,
    },
    Department {
        id: "mech",
        name: "Mechanical Engineering",
        academic: true,
    },
    Department {
        id: "ece",
        name: "Electronics and Communication Engineering",
        academic: true,
    },
    Department {
        id: "civil",
        name: "Civil Engineering",
        academic: true,
    },
    Department {
        id: LIBRARY_DEPARTMENT_ID,
        name: "Library",
        academic: false,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearData {
    pub year: u8,
    pub semesters: [u8; 2],
}

pub const YEARS: [YearData; 4] = [
    YearData {
        year: 1,
        semesters: [1, 2],
    },
    YearData {
        year: 2,
        semesters: [3, 4],
    },
    YearData {
        year: 3,
        semesters: [5, 6],
    },
    YearData {
        year: 4,
        semesters: [7, 8],
    },
];

pub fn find_department(id: &str) -> Option<&'static Department> {
    let id = id.trim();
    DEPARTMENTS.iter().find(|d| d.id.eq_ignore_ascii_case(id))
}

/// Resolves a department id that must name an academic program.
pub fn academic_department(id: &str) -> RecordsResult<&'static Department> {
    let Some(dept) = find_department(id) else {
        return Err(RecordsError::InvalidInput(format!(
            "unknown department: {}",
            id.trim()
        )));
    };
    if !dept.academic {
        return Err(RecordsError::InvalidInput(format!(
            "{} is not an academic department",
            dept.name
        )));
    }
    Ok(dept)
}

pub fn year_for_semester(semester: u8) -> Option<u8> {
    YEARS
        .iter()
        .find(|y| y.semesters.contains(&semester))
        .map(|y| y.year)
}

/// The batch/department (and optionally semester) context a request acts in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub batch: String,
    pub department: &'static Department,
    pub semester: u8,
}

/// Roster context without a semester (library and profile views).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterKey {
    pub batch: String,
    pub department: &'static Department,
}

impl RosterKey {
    pub fn resolve(batch: Option<&str>, department: Option<&str>) -> RecordsResult<Self> {
        let batch = batch.map(str::trim).filter(|b| !b.is_empty());
        let department = department.map(str::trim).filter(|d| !d.is_empty());
        let (Some(batch), Some(department)) = (batch, department) else {
            return Err(RecordsError::MissingSelection(
                "select a batch and a department first".to_string(),
            ));
        };
        Ok(Self {
            batch: batch.to_string(),
            department: academic_department(department)?,
        })
    }
}

impl Selection {
    pub fn resolve(
        batch: Option<&str>,
        department: Option<&str>,
        semester: Option<i64>,
    ) -> RecordsResult<Self> {
        let key = RosterKey::resolve(batch, department)?;
        let Some(semester) = semester else {
            return Err(RecordsError::MissingSelection(
                "select a semester first".to_string(),
            ));
        };
        let semester = u8::try_from(semester)
            .ok()
            .filter(|s| is_valid_semester(*s))
            .ok_or_else(|| {
                RecordsError::InvalidInput(format!("semester must be 1..8, got {semester}"))
            })?;
        Ok(Self {
            batch: key.batch,
            department: key.department,
            semester,
        })
    }

    pub fn roster_key(&self) -> RosterKey {
        RosterKey {
            batch: self.batch.clone(),
            department: self.department,
        }
    }
}

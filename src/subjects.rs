use crate::error::{RecordsError, RecordsResult};
use crate::model::Subject;
use serde_json::json;

fn trimmed(subject: &Subject) -> Subject {
    Subject {
        name: subject.name.trim().to_string(),
        code: subject.code.trim().to_string(),
        category: subject.category.trim().to_string(),
    }
}

/// Trims every field and checks that names are present and unique
/// (case-insensitively). Order is preserved.
pub fn normalize_subject_list(subjects: &[Subject]) -> RecordsResult<Vec<Subject>> {
    let mut out: Vec<Subject> = Vec::with_capacity(subjects.len());
    for s in subjects {
        out = add_subject(&out, s)?;
    }
    Ok(out)
}

pub fn add_subject(subjects: &[Subject], candidate: &Subject) -> RecordsResult<Vec<Subject>> {
    let candidate = trimmed(candidate);
    if candidate.name.is_empty() {
        return Err(RecordsError::InvalidInput(
            "subject name cannot be empty".to_string(),
        ));
    }
    if subjects
        .iter()
        .any(|s| s.name.to_lowercase() == candidate.name.to_lowercase())
    {
        return Err(RecordsError::InvalidInput(format!(
            "subject \"{}\" already exists",
            candidate.name
        )));
    }
    let mut out = subjects.to_vec();
    out.push(candidate);
    Ok(out)
}

pub fn remove_subject(subjects: &[Subject], name: &str) -> RecordsResult<Vec<Subject>> {
    if !subjects.iter().any(|s| s.name == name) {
        return Err(RecordsError::NotFound(format!("subject not found: {name}")));
    }
    Ok(subjects.iter().filter(|s| s.name != name).cloned().collect())
}

/// Names present in `old` but missing from `new`; their marks are dropped on save.
pub fn removed_subjects(old: &[Subject], new: &[Subject]) -> Vec<String> {
    old.iter()
        .filter(|o| !new.iter().any(|n| n.name == o.name))
        .map(|o| o.name.clone())
        .collect()
}

/// Fails unless the caller confirmed that marks for removed subjects may be lost.
pub fn check_removals_confirmed(
    old: &[Subject],
    new: &[Subject],
    confirmed: bool,
) -> RecordsResult<Vec<String>> {
    let removed = removed_subjects(old, new);
    if !removed.is_empty() && !confirmed {
        return Err(RecordsError::ConfirmationRequired {
            message: format!(
                "removing {} subject(s) permanently deletes their marks for every student in this semester",
                removed.len()
            ),
            details: json!({ "removedSubjects": removed }),
        });
    }
    Ok(removed)
}
